//! # contract: shared records and the seams between pipeline stages
//!
//! The generation pipeline is `fetch -> parse -> analyze -> emit`. The two
//! stages that talk to the outside world ([`Fetcher`] and [`ModelClient`]) and
//! the interchangeable analysis strategies ([`Analyzer`]) are traits, so the
//! pipeline can be driven end-to-end in tests with `mockall` mocks.
//!
//! All records here live for a single run. Nothing is persisted except the
//! emitted query file, the review report and (optionally) the model reply
//! cache.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, ModelError, SourceError};
use crate::source::CollectionSource;

/// Where a collection's documentation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Github,
    Galaxy,
    Local,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Github => "github",
            SourceKind::Galaxy => "galaxy",
            SourceKind::Local => "local",
        })
    }
}

/// One module as returned by a fetcher. A failed download is carried, not dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedModule {
    /// Short module name (`guest_info`), without namespace or collection.
    pub name: String,
    pub content: Result<String, FetchError>,
}

/// Everything a fetcher found for one collection, modules sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedCollection {
    /// Default `namespace.collection` name derived from the source.
    pub collection_name: String,
    pub source: SourceKind,
    pub modules: Vec<FetchedModule>,
}

/// Shape of a module's returned resource collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    List,
    Dict,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContainerKind::List => "list",
            ContainerKind::Dict => "dict",
        })
    }
}

/// How much an inference can be trusted. Ordered from most to least trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    Fallback,
}

impl Confidence {
    /// Medium, low and fallback decisions go to the review report.
    pub fn needs_review(self) -> bool {
        self != Confidence::High
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Fallback => "fallback",
        })
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            "fallback" => Ok(Confidence::Fallback),
            other => Err(format!("unknown confidence '{other}'")),
        }
    }
}

/// The signal a container decision was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceSignal {
    DeclaredType,
    Elements,
    SampleShape,
    ContainsOnly,
    NamingConvention,
    Model,
}

impl fmt::Display for InferenceSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InferenceSignal::DeclaredType => "declared_type",
            InferenceSignal::Elements => "elements",
            InferenceSignal::SampleShape => "sample_shape",
            InferenceSignal::ContainsOnly => "contains_only",
            InferenceSignal::NamingConvention => "naming_convention",
            InferenceSignal::Model => "model",
        })
    }
}

/// Fixed vocabulary of resource types accepted by the event query schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    VirtualMachine,
    NetworkDevice,
    NetworkInterface,
    NetworkResource,
    Storage,
    Database,
    Container,
    ContainerCluster,
    ComputeHost,
    Cluster,
    ResourceGroup,
    ManagedNode,
}

impl ResourceType {
    pub const ALL: [ResourceType; 12] = [
        ResourceType::VirtualMachine,
        ResourceType::NetworkDevice,
        ResourceType::NetworkInterface,
        ResourceType::NetworkResource,
        ResourceType::Storage,
        ResourceType::Database,
        ResourceType::Container,
        ResourceType::ContainerCluster,
        ResourceType::ComputeHost,
        ResourceType::Cluster,
        ResourceType::ResourceGroup,
        ResourceType::ManagedNode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::VirtualMachine => "virtual_machine",
            ResourceType::NetworkDevice => "network_device",
            ResourceType::NetworkInterface => "network_interface",
            ResourceType::NetworkResource => "network_resource",
            ResourceType::Storage => "storage",
            ResourceType::Database => "database",
            ResourceType::Container => "container",
            ResourceType::ContainerCluster => "container_cluster",
            ResourceType::ComputeHost => "compute_host",
            ResourceType::Cluster => "cluster",
            ResourceType::ResourceGroup => "resource_group",
            ResourceType::ManagedNode => "managed_node",
        }
    }

    /// Plural label used in display names.
    pub fn label(self) -> &'static str {
        match self {
            ResourceType::VirtualMachine => "Virtual machines",
            ResourceType::NetworkDevice => "Network devices",
            ResourceType::NetworkInterface => "Network interfaces",
            ResourceType::NetworkResource => "Network resources",
            ResourceType::Storage => "Storage",
            ResourceType::Database => "Databases",
            ResourceType::Container => "Containers",
            ResourceType::ContainerCluster => "Container clusters",
            ResourceType::ComputeHost => "Compute hosts",
            ResourceType::Cluster => "Clusters",
            ResourceType::ResourceGroup => "Resource groups",
            ResourceType::ManagedNode => "Managed nodes",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown resource type '{s}'"))
    }
}

/// One named jq expression inside a query block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierQuery {
    pub name: String,
    pub description: String,
    pub jq_expression: String,
}

/// The final output unit for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEntry {
    /// Fully-qualified module name, e.g. `vmware.vmware.guest_info`.
    pub fqcn: String,
    pub display_name: String,
    pub resource_type: ResourceType,
    /// Top-level RETURN field the resources live under.
    pub container: String,
    pub container_kind: ContainerKind,
    pub queries: Vec<IdentifierQuery>,
    pub confidence: Confidence,
    pub signal: InferenceSignal,
    pub note: Option<String>,
}

impl QueryEntry {
    /// Regex matching the module's FQCN literally.
    pub fn collection_pattern(&self) -> String {
        format!("^{}$", regex::escape(&self.fqcn))
    }
}

/// Retrieves module documentation for a collection source.
///
/// Implementations fail only when the source itself cannot be resolved;
/// per-module problems are carried in [`FetchedModule::content`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_collection(
        &self,
        source: &CollectionSource,
    ) -> Result<FetchedCollection, SourceError>;
}

/// Produces one [`QueryEntry`] per module doc, in input order.
///
/// Analysis never fails: anything that cannot be inferred degrades to a
/// lower-confidence entry.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Short strategy name for logs and the run summary.
    fn name(&self) -> &'static str;

    async fn analyze(&self, docs: &[crate::docs::ModuleDoc]) -> Vec<QueryEntry>;
}

/// A text-completion endpoint of an external generative model.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}
