//! Rule-based inference: container shape, canonical identifier and resource type.
//!
//! Container rules, first applicable signal wins:
//! 1. declared `type: list` / `type: dict` (high)
//! 2. an `elements:` attribute implies list (high)
//! 3. sample shape: sequence is list, mapping is dict (medium)
//! 4. `contains:` without a type defaults to dict (low)
//! 5. nothing usable: guess from the module name (low / fallback)

use serde_yaml::Value;

use crate::contract::{
    Confidence, ContainerKind, IdentifierQuery, InferenceSignal, QueryEntry, ResourceType,
};
use crate::docs::{scalar_to_string, DeclaredType, ModuleDoc, ReturnField, ReturnSchema};
use crate::jq;

/// Candidate identifier fields in priority order, with the name emitted for each.
pub const IDENTIFIER_PRIORITY: [(&str, &str); 9] = [
    ("moid", "moid"),
    ("instance_uuid", "instance_uuid"),
    ("hw_product_uuid", "bios_uuid"),
    ("uuid", "uuid"),
    ("arn", "arn"),
    ("resource_id", "resource_id"),
    ("id", "id"),
    ("serial", "serial"),
    ("name", "name"),
];

/// Identifiers assumed for VMware `instance` results that document no fields.
const VMWARE_INSTANCE_FIELDS: [&str; 3] = ["moid", "instance_uuid", "hw_product_uuid"];

const EXCLUDED_ID_TERMS: [&str; 8] = [
    "enabled",
    "needed",
    "valid",
    "available",
    "behavior",
    "override",
    "consolidat",
    "vlan_id",
];

/// The shape decision for one RETURN field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeDecision {
    pub kind: ContainerKind,
    pub confidence: Confidence,
    pub signal: InferenceSignal,
}

/// The container a module's resources live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDecision {
    pub field: String,
    pub kind: ContainerKind,
    pub confidence: Confidence,
    pub signal: InferenceSignal,
}

/// Classifies a field as list- or dict-shaped; `None` for scalar fields.
pub fn infer_field_shape(field: &ReturnField) -> Option<ShapeDecision> {
    let decision = |kind, confidence, signal| {
        Some(ShapeDecision {
            kind,
            confidence,
            signal,
        })
    };

    match &field.declared_type {
        Some(DeclaredType::List) => {
            return decision(ContainerKind::List, Confidence::High, InferenceSignal::DeclaredType)
        }
        Some(DeclaredType::Dict) => {
            return decision(ContainerKind::Dict, Confidence::High, InferenceSignal::DeclaredType)
        }
        Some(DeclaredType::Scalar(_)) => return None,
        Some(DeclaredType::Other(_)) | None => {}
    }

    if field.elements.is_some() {
        return decision(ContainerKind::List, Confidence::High, InferenceSignal::Elements);
    }

    match &field.sample {
        Some(Value::Sequence(_)) => {
            return decision(ContainerKind::List, Confidence::Medium, InferenceSignal::SampleShape)
        }
        Some(Value::Mapping(_)) => {
            return decision(ContainerKind::Dict, Confidence::Medium, InferenceSignal::SampleShape)
        }
        _ => {}
    }

    if !field.contains.is_empty() {
        return decision(ContainerKind::Dict, Confidence::Low, InferenceSignal::ContainsOnly);
    }

    None
}

/// The first top-level field, in declaration order, that is list- or dict-shaped.
pub fn select_container(schema: &ReturnSchema) -> Option<ContainerDecision> {
    schema.fields.iter().find_map(|field| {
        infer_field_shape(field).map(|shape| ContainerDecision {
            field: field.name.clone(),
            kind: shape.kind,
            confidence: shape.confidence,
            signal: shape.signal,
        })
    })
}

/// Guesses a container from the module name: `_info` modules return a list
/// under the pluralised stem, everything else a dict under `state`.
pub fn container_from_name(module_name: &str) -> (String, ContainerKind) {
    match module_name.strip_suffix("_info") {
        Some(stem) if !stem.is_empty() => (pluralize(stem), ContainerKind::List),
        _ => ("state".to_string(), ContainerKind::Dict),
    }
}

fn pluralize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{word}es")
    } else if let Some(stem) = word.strip_suffix('y') {
        match stem.chars().last() {
            Some(c) if !"aeiou".contains(c.to_ascii_lowercase()) => format!("{stem}ies"),
            _ => format!("{word}s"),
        }
    } else {
        format!("{word}s")
    }
}

/// Whether a mapping key in sample data names an example resource rather than a field
/// (`esxi01.example.com`, `DC0_C0`, `0`, UUID-like keys, `My-Cluster`).
pub fn looks_like_example_key(key: &str) -> bool {
    let Some(first) = key.chars().next() else {
        return false;
    };
    key.contains('.')
        || key.starts_with("DC")
        || key.starts_with("Sample_")
        || key.starts_with("My-")
        || first.is_ascii_digit()
        || (key.len() > 20 && key.contains('-'))
        || key.contains("_C")
        || key.contains("_H")
        || (first.is_ascii_uppercase() && (key.contains('-') || key.contains('_')))
}

/// Whether a field name looks like a resource identifier.
pub fn is_identifier_name(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    let is_id = matches!(
        lower.as_str(),
        "moid" | "uuid" | "id" | "arn" | "serial" | "guid" | "product_uuid" | "resource_id"
    ) || lower.ends_with("_uuid")
        || lower.ends_with("_id")
        || lower.ends_with("_moid");
    is_id && !EXCLUDED_ID_TERMS.iter().any(|t| lower.contains(t))
}

/// Field names of one resource in a sample: the first element of a list, and
/// mapping keys with example-instance keys looked through (two levels deep).
pub fn sample_field_names(sample: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_sample_keys(sample, 0, &mut out);
    out
}

fn collect_sample_keys(value: &Value, depth: usize, out: &mut Vec<String>) {
    match value {
        Value::Sequence(items) => {
            if let Some(first @ Value::Mapping(_)) = items.first() {
                collect_sample_keys(first, depth, out);
            }
        }
        Value::Mapping(map) => {
            for (k, v) in map {
                let Some(key) = scalar_to_string(k) else {
                    continue;
                };
                if looks_like_example_key(&key) && v.is_mapping() {
                    if depth < 2 {
                        collect_sample_keys(v, depth + 1, out);
                    }
                    continue;
                }
                push_unique(out, key);
            }
        }
        _ => {}
    }
}

/// Whether a dict sample is keyed by example instances (`{DC0_C0: {...}}`).
fn keyed_by_instances(sample: &Value) -> bool {
    match sample {
        Value::Mapping(map) if !map.is_empty() => map.iter().all(|(k, v)| {
            v.is_mapping() && scalar_to_string(k).is_some_and(|k| looks_like_example_key(&k))
        }),
        _ => false,
    }
}

/// Field names documented for the resources under a container field.
pub fn visible_fields(field: &ReturnField) -> Vec<String> {
    let mut out = Vec::new();
    for nested in &field.contains {
        push_unique(&mut out, nested.name.clone());
    }
    if let Some(sample) = &field.sample {
        for key in sample_field_names(sample) {
            push_unique(&mut out, key);
        }
    }
    out
}

/// Identifier-looking field names anywhere in the schema, including samples.
pub fn identifier_fields(schema: &ReturnSchema) -> Vec<String> {
    let mut out = Vec::new();
    for field in &schema.fields {
        collect_identifiers(field, &mut out);
    }
    out
}

fn collect_identifiers(field: &ReturnField, out: &mut Vec<String>) {
    if is_identifier_name(&field.name) {
        push_unique(out, field.name.clone());
    }
    for nested in &field.contains {
        collect_identifiers(nested, out);
    }
    if let Some(sample) = &field.sample {
        collect_sample_identifiers(sample, 0, out);
    }
}

fn collect_sample_identifiers(value: &Value, depth: usize, out: &mut Vec<String>) {
    match value {
        Value::Sequence(items) => {
            if let Some(first) = items.first() {
                collect_sample_identifiers(first, depth, out);
            }
        }
        Value::Mapping(map) if depth <= 2 => {
            for (k, v) in map {
                let Some(key) = scalar_to_string(k) else {
                    continue;
                };
                if !looks_like_example_key(&key) && is_identifier_name(&key) {
                    push_unique(out, key);
                }
                if v.is_mapping() {
                    collect_sample_identifiers(v, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !out.contains(&value) {
        out.push(value);
    }
}

/// The chosen canonical identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierChoice {
    /// Field name in the module's return value.
    pub source_field: String,
    /// Name written to the query file (`hw_product_uuid` becomes `bios_uuid`).
    pub emitted_name: String,
    /// Position in [`IDENTIFIER_PRIORITY`]; `None` when nothing matched.
    pub rank: Option<usize>,
}

impl IdentifierChoice {
    pub fn matched(&self) -> bool {
        self.rank.is_some()
    }
}

/// Picks the highest-priority identifier present (case-insensitive); ties go
/// to the first field in declaration order. Falls back to `name`.
pub fn select_identifier<S: AsRef<str>>(fields: &[S]) -> IdentifierChoice {
    for (rank, (wanted, emitted)) in IDENTIFIER_PRIORITY.iter().enumerate() {
        if let Some(found) = fields.iter().find(|f| f.as_ref().eq_ignore_ascii_case(wanted)) {
            return IdentifierChoice {
                source_field: found.as_ref().to_string(),
                emitted_name: emitted.to_string(),
                rank: Some(rank),
            };
        }
    }
    IdentifierChoice {
        source_field: "name".to_string(),
        emitted_name: "name".to_string(),
        rank: None,
    }
}

/// Keyword rules over `_`-separated module name words, checked in order.
const RESOURCE_RULES: &[(ResourceType, &[&str])] = &[
    (
        ResourceType::ContainerCluster,
        &["eks", "aks", "gke", "ecs", "openshift", "k8s_cluster", "kubernetes_cluster"],
    ),
    (
        ResourceType::Container,
        &["container", "containers", "docker", "podman", "pod", "pods", "k8s", "kubernetes"],
    ),
    (
        ResourceType::Database,
        &[
            "db", "database", "databases", "rds", "sql", "mysql", "postgresql", "mongodb",
            "dynamodb", "redis", "elasticache", "cosmosdb",
        ],
    ),
    (
        ResourceType::VirtualMachine,
        &["vm", "vms", "guest", "guests", "instance", "instances", "virtualmachine"],
    ),
    (
        ResourceType::NetworkInterface,
        &["interface", "interfaces", "nic", "nics", "vnic", "vmnic", "vmkernel", "eni"],
    ),
    (
        ResourceType::NetworkDevice,
        &["router", "routers", "firewall", "firewalls", "device", "devices"],
    ),
    (
        ResourceType::NetworkResource,
        &[
            "network", "networks", "dvs", "dvswitch", "vswitch", "switch", "portgroup",
            "portgroups", "vpc", "subnet", "subnets", "vlan", "vlans", "elb", "security_group",
            "route_table", "nat_gateway",
        ],
    ),
    (
        ResourceType::Storage,
        &[
            "datastore", "datastores", "storage", "volume", "volumes", "disk", "disks", "s3",
            "bucket", "buckets", "ebs", "snapshot", "snapshots", "nfs", "lun", "blob",
        ],
    ),
    (
        ResourceType::ComputeHost,
        &["host", "hosts", "esxi", "hypervisor", "appliance", "vcsa", "baremetal"],
    ),
    (ResourceType::Cluster, &["cluster", "clusters", "drs"]),
    (
        ResourceType::ResourceGroup,
        &[
            "datacenter", "datacenters", "folder", "folders", "resource_group", "resourcegroup",
            "resource_pool", "project", "projects", "tenant",
        ],
    ),
];

/// Collection namespaces or names whose modules manage network devices.
const NETWORK_VENDORS: &[&str] = &[
    "cisco", "arista", "junipernetworks", "ios", "iosxr", "nxos", "eos", "junos", "fortinet",
    "paloaltonetworks", "vyos", "dellemc_networking",
];

/// Maps a fully-qualified module name onto the resource type vocabulary.
pub fn classify_resource(fqcn: &str) -> ResourceType {
    let mut parts = fqcn.rsplitn(2, '.');
    let module = parts.next().unwrap_or(fqcn).to_ascii_lowercase();
    let collection = parts.next().unwrap_or("").to_ascii_lowercase();

    let padded = format!("_{module}_");
    for (resource_type, keywords) in RESOURCE_RULES {
        if keywords.iter().any(|kw| padded.contains(&format!("_{kw}_"))) {
            return *resource_type;
        }
    }

    if collection
        .split('.')
        .any(|part| NETWORK_VENDORS.contains(&part))
    {
        return ResourceType::NetworkDevice;
    }
    ResourceType::ManagedNode
}

/// Rule-based analysis of one module. Always produces an entry.
pub fn infer_entry(doc: &ModuleDoc) -> QueryEntry {
    let resource_type = classify_resource(&doc.fqcn);
    let mut notes: Vec<String> = Vec::new();

    let (container, kind, mut confidence, signal, fields) = match &doc.schema {
        Err(problem) => {
            let (container, kind) = container_from_name(&doc.module_name);
            notes.push(format!("{problem}; container guessed from module name"));
            (
                container,
                kind,
                Confidence::Fallback,
                InferenceSignal::NamingConvention,
                Vec::new(),
            )
        }
        Ok(schema) => match select_container(schema) {
            Some(decision) => {
                let mut confidence = decision.confidence;
                let mut fields = Vec::new();
                if let Some(field) = schema.field(&decision.field) {
                    fields = visible_fields(field);
                    if decision.kind == ContainerKind::Dict
                        && field.sample.as_ref().is_some_and(keyed_by_instances)
                    {
                        notes.push(format!(
                            "sample of '{}' is keyed by resource names; values may need iterating",
                            decision.field
                        ));
                        confidence = confidence.max(Confidence::Medium);
                    }
                }
                if decision.signal == InferenceSignal::ContainsOnly {
                    notes.push(format!(
                        "'{}' has 'contains' but no type; assumed dict",
                        decision.field
                    ));
                }
                if decision.field == "instance"
                    && !fields.iter().any(|f| is_identifier_name(f))
                {
                    notes.push("assumed VMware VM identifiers for 'instance'".to_string());
                    fields.extend(VMWARE_INSTANCE_FIELDS.iter().map(|f| f.to_string()));
                }
                (decision.field, decision.kind, confidence, decision.signal, fields)
            }
            None => {
                let (container, kind) = container_from_name(&doc.module_name);
                notes.push(
                    "RETURN documents no list or dict field; container guessed from module name"
                        .to_string(),
                );
                let mut fields = identifier_fields(schema);
                for f in &schema.fields {
                    push_unique(&mut fields, f.name.clone());
                }
                (
                    container,
                    kind,
                    Confidence::Low,
                    InferenceSignal::NamingConvention,
                    fields,
                )
            }
        },
    };

    let choice = select_identifier(&fields);
    if !choice.matched() {
        notes.push(format!(
            "no known identifier under '{container}'; fell back to 'name'"
        ));
        confidence = confidence.max(Confidence::Low);
    }

    let jq_expression = match kind {
        ContainerKind::List => jq::list_accessor(&container, &choice.emitted_name, &choice.source_field),
        ContainerKind::Dict => jq::dict_accessor(&container, &choice.emitted_name, &choice.source_field),
    };

    build_entry(
        doc,
        resource_type,
        container,
        kind,
        IdentifierQuery {
            description: identifier_description(&choice, &doc.fqcn),
            name: choice.emitted_name,
            jq_expression,
        },
        confidence,
        signal,
        (!notes.is_empty()).then(|| notes.join("; ")),
    )
}

fn identifier_description(choice: &IdentifierChoice, fqcn: &str) -> String {
    if choice.source_field == choice.emitted_name {
        format!("Canonical {} of each resource returned by {fqcn}", choice.emitted_name)
    } else {
        format!(
            "Canonical {} (from {}) of each resource returned by {fqcn}",
            choice.emitted_name, choice.source_field
        )
    }
}

/// Assembles an entry; shared with the model-assisted analyzer.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_entry(
    doc: &ModuleDoc,
    resource_type: ResourceType,
    container: String,
    container_kind: ContainerKind,
    query: IdentifierQuery,
    confidence: Confidence,
    signal: InferenceSignal,
    note: Option<String>,
) -> QueryEntry {
    QueryEntry {
        fqcn: doc.fqcn.clone(),
        display_name: format!("{} ({})", resource_type.label(), doc.fqcn),
        resource_type,
        container,
        container_kind,
        queries: vec![query],
        confidence,
        signal,
        note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FetchedModule;
    use crate::docs::parse_return_schema;

    fn field(yaml: &str) -> ReturnField {
        parse_return_schema(yaml).unwrap().fields.remove(0)
    }

    fn doc(module: &str, content: &str) -> ModuleDoc {
        ModuleDoc::from_fetched(
            "vmware.vmware",
            &FetchedModule {
                name: module.to_string(),
                content: Ok(content.to_string()),
            },
        )
    }

    #[test]
    fn explicit_type_wins_over_sample_shape() {
        let f = field("guests:\n  type: list\n  sample: {moid: vm-1}\n");
        let d = infer_field_shape(&f).unwrap();
        assert_eq!(d.kind, ContainerKind::List);
        assert_eq!(d.confidence, Confidence::High);
        assert_eq!(d.signal, InferenceSignal::DeclaredType);

        let f = field("cluster:\n  type: dict\n  sample: [{moid: c-1}]\n");
        assert_eq!(infer_field_shape(&f).unwrap().kind, ContainerKind::Dict);
    }

    #[test]
    fn elements_implies_list_regardless_of_sample() {
        let f = field("guests:\n  elements: dict\n  sample: {moid: vm-1}\n");
        let d = infer_field_shape(&f).unwrap();
        assert_eq!(d.kind, ContainerKind::List);
        assert_eq!(d.signal, InferenceSignal::Elements);
        assert_eq!(d.confidence, Confidence::High);
    }

    #[test]
    fn sample_shape_is_medium_confidence() {
        let list = infer_field_shape(&field("a:\n  sample: [1, 2]\n")).unwrap();
        assert_eq!((list.kind, list.confidence), (ContainerKind::List, Confidence::Medium));
        let dict = infer_field_shape(&field("a:\n  sample: {x: 1}\n")).unwrap();
        assert_eq!((dict.kind, dict.confidence), (ContainerKind::Dict, Confidence::Medium));
    }

    #[test]
    fn contains_without_type_defaults_to_dict_low() {
        let d = infer_field_shape(&field("a:\n  contains:\n    id:\n      type: str\n")).unwrap();
        assert_eq!(d.kind, ContainerKind::Dict);
        assert_eq!(d.confidence, Confidence::Low);
        assert_eq!(d.signal, InferenceSignal::ContainsOnly);
    }

    const EC2_INSTANCES: &str = "instances:
  type: complex
  contains:
    instance_id:
      type: str
    arn:
      type: str
";

    #[test]
    fn complex_type_with_contains_is_not_trusted() {
        let d = infer_field_shape(&field(EC2_INSTANCES)).unwrap();
        assert_eq!(d.kind, ContainerKind::Dict);
        assert_eq!(d.confidence, Confidence::Low);
        assert_eq!(d.signal, InferenceSignal::ContainsOnly);

        let entry = infer_entry(&doc(
            "ec2_instance_info",
            &format!("RETURN = r'''\n{EC2_INSTANCES}'''\n"),
        ));
        assert_eq!(entry.container, "instances");
        assert_eq!(entry.confidence, Confidence::Low);
        assert_eq!(entry.signal, InferenceSignal::ContainsOnly);
        assert!(entry.confidence.needs_review());
    }

    #[test]
    fn loose_types_fall_through_to_later_rules() {
        let list = infer_field_shape(&field("instances:\n  type: complex\n  sample: [{arn: a}]\n")).unwrap();
        assert_eq!((list.kind, list.confidence), (ContainerKind::List, Confidence::Medium));
        assert_eq!(list.signal, InferenceSignal::SampleShape);

        let dict = infer_field_shape(&field("state:\n  type: raw\n  sample: {id: x}\n")).unwrap();
        assert_eq!((dict.kind, dict.signal), (ContainerKind::Dict, InferenceSignal::SampleShape));

        let elements = infer_field_shape(&field("vpcs:\n  type: array\n  elements: dict\n")).unwrap();
        assert_eq!((elements.kind, elements.signal), (ContainerKind::List, InferenceSignal::Elements));

        assert!(infer_field_shape(&field("blob:\n  type: raw\n")).is_none());
    }

    #[test]
    fn scalar_fields_are_not_containers() {
        assert!(infer_field_shape(&field("changed:\n  type: bool\n")).is_none());
        assert!(infer_field_shape(&field("msg:\n  description: text\n")).is_none());
    }

    #[test]
    fn moid_beats_every_other_candidate() {
        let cases: &[&[&str]] = &[
            &["name", "id", "uuid", "moid"],
            &["moid", "name"],
            &["serial", "arn", "MOID"],
        ];
        for fields in cases {
            let choice = select_identifier(fields);
            assert_eq!(choice.emitted_name, "moid", "{fields:?}");
            assert_eq!(choice.rank, Some(0));
        }
    }

    #[test]
    fn selection_is_independent_of_field_order() {
        let a = select_identifier(&["uuid", "id", "arn"]);
        let b = select_identifier(&["arn", "id", "uuid"]);
        assert_eq!(a, b);
        assert_eq!(a.emitted_name, "uuid");
    }

    #[test]
    fn hw_product_uuid_is_emitted_as_bios_uuid() {
        let choice = select_identifier(&["name", "hw_product_uuid"]);
        assert_eq!(choice.source_field, "hw_product_uuid");
        assert_eq!(choice.emitted_name, "bios_uuid");
    }

    #[test]
    fn unmatched_fields_fall_back_to_name() {
        let choice = select_identifier(&["power_state", "folder"]);
        assert_eq!(choice.emitted_name, "name");
        assert!(!choice.matched());
        assert!(select_identifier(&["name"]).matched());
    }

    #[test]
    fn names_the_container_after_info_modules() {
        assert_eq!(container_from_name("guest_info"), ("guests".into(), ContainerKind::List));
        assert_eq!(container_from_name("policy_info"), ("policies".into(), ContainerKind::List));
        assert_eq!(container_from_name("address_info"), ("addresses".into(), ContainerKind::List));
        assert_eq!(container_from_name("key_info"), ("keys".into(), ContainerKind::List));
        assert_eq!(container_from_name("vm"), ("state".into(), ContainerKind::Dict));
    }

    #[test]
    fn sample_keys_skip_example_instances() {
        let sample: Value = serde_yaml::from_str(
            "DC0_C0:\n  moid: domain-c1\n  name: DC0_C0\nesxi01.example.com:\n  uuid: abc\n",
        )
        .unwrap();
        assert_eq!(sample_field_names(&sample), ["moid", "name", "uuid"]);
    }

    #[test]
    fn identifier_names_exclude_false_positives() {
        for yes in ["moid", "instance_uuid", "vpc_id", "ARN", "serial"] {
            assert!(is_identifier_name(yes), "{yes}");
        }
        for no in ["vlan_id", "uuid_valid", "name", "enabled_id"] {
            assert!(!is_identifier_name(no), "{no}");
        }
    }

    #[test]
    fn classifies_module_names() {
        let cases = [
            ("vmware.vmware.guest_info", ResourceType::VirtualMachine),
            ("vmware.vmware.vm", ResourceType::VirtualMachine),
            ("vmware.vmware.esxi_host", ResourceType::ComputeHost),
            ("vmware.vmware.cluster_info", ResourceType::Cluster),
            ("vmware.vmware.folder_template_from_vm", ResourceType::VirtualMachine),
            ("vmware.vmware.folder", ResourceType::ResourceGroup),
            ("vmware.vmware.datastore_info", ResourceType::Storage),
            ("amazon.aws.ec2_instance_info", ResourceType::VirtualMachine),
            ("amazon.aws.rds_instance", ResourceType::Database),
            ("amazon.aws.s3_bucket", ResourceType::Storage),
            ("amazon.aws.ec2_vpc_subnet", ResourceType::NetworkResource),
            ("community.aws.eks_cluster", ResourceType::ContainerCluster),
            ("cisco.ios.ios_interfaces", ResourceType::NetworkInterface),
            ("cisco.ios.ios_facts", ResourceType::NetworkDevice),
            ("azure.azcollection.azure_rm_resourcegroup", ResourceType::ResourceGroup),
            ("community.general.nmcli", ResourceType::ManagedNode),
        ];
        for (fqcn, expected) in cases {
            assert_eq!(classify_resource(fqcn), expected, "{fqcn}");
        }
    }

    #[test]
    fn documented_list_module_yields_iterating_query() {
        let entry = doc(
            "guest_info",
            "RETURN = r'''\nguests:\n  type: list\n  elements: dict\n  returned: always\n  sample: [{moid: vm-1}, {moid: vm-2}]\n'''\n",
        );
        let entry = infer_entry(&entry);
        assert_eq!(entry.container, "guests");
        assert_eq!(entry.container_kind, ContainerKind::List);
        assert_eq!(entry.confidence, Confidence::High);
        assert_eq!(entry.resource_type, ResourceType::VirtualMachine);
        assert_eq!(entry.queries[0].name, "moid");
        assert_eq!(entry.queries[0].jq_expression, ".guests[] | {moid: .moid} // empty");
        assert!(entry.note.is_none());
    }

    #[test]
    fn undocumented_info_module_is_a_fallback_with_note() {
        let entry = infer_entry(&doc("host_info", "def main(): pass\n"));
        assert_eq!(entry.confidence, Confidence::Fallback);
        assert_eq!(entry.signal, InferenceSignal::NamingConvention);
        assert_eq!(entry.container, "hosts");
        assert_eq!(entry.container_kind, ContainerKind::List);
        assert!(!entry.note.as_deref().unwrap_or("").is_empty());
    }

    #[test]
    fn instance_container_assumes_vmware_identifiers() {
        let entry = infer_entry(&doc(
            "vm",
            "RETURN = r'''\ninstance:\n  type: dict\n  returned: always\n  description: VM facts\n'''\n",
        ));
        assert_eq!(entry.container_kind, ContainerKind::Dict);
        assert_eq!(entry.queries[0].name, "moid");
        assert_eq!(
            entry.queries[0].jq_expression,
            ".instance | select(. != null) | {moid: .moid} // empty"
        );
        assert!(entry.note.unwrap().contains("VMware"));
    }

    #[test]
    fn schema_without_container_uses_naming_convention_low() {
        let entry = infer_entry(&doc(
            "tag_info",
            "RETURN = r'''\ntag_id:\n  type: str\n  returned: always\n'''\n",
        ));
        assert_eq!(entry.confidence, Confidence::Low);
        assert_eq!(entry.container, "tags");
        assert_eq!(entry.queries[0].name, "name");
    }

    #[test]
    fn instance_keyed_dict_sample_is_flagged() {
        let entry = infer_entry(&doc(
            "cluster_info",
            "RETURN = r'''\nclusters:\n  type: dict\n  returned: always\n  sample:\n    DC0_C0:\n      moid: domain-c1\n'''\n",
        ));
        assert_eq!(entry.container_kind, ContainerKind::Dict);
        assert_eq!(entry.confidence, Confidence::Medium);
        assert_eq!(entry.queries[0].name, "moid");
        assert!(entry.note.unwrap().contains("keyed by resource names"));
    }
}
