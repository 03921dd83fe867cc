//! Namespace filtering for dump pages

use std::collections::HashSet;

/// Decides whether a page with the given namespace is imported.
///
/// `None` means the page had no namespace or a non-numeric one.
pub trait NamespaceFilter: Send + Sync {
    fn accepts(&self, namespace: Option<i32>) -> bool;
}

/// Main (article) namespace only. The default filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct MainNamespace;

impl NamespaceFilter for MainNamespace {
    fn accepts(&self, namespace: Option<i32>) -> bool {
        namespace == Some(0)
    }
}

/// Accepts pages whose namespace is in an explicit set
#[derive(Debug, Clone)]
pub struct NamespaceAllowlist {
    allowed: HashSet<i32>,
}

impl NamespaceAllowlist {
    pub fn new(namespaces: impl IntoIterator<Item = i32>) -> Self {
        Self {
            allowed: namespaces.into_iter().collect(),
        }
    }
}

impl NamespaceFilter for NamespaceAllowlist {
    fn accepts(&self, namespace: Option<i32>) -> bool {
        namespace.is_some_and(|ns| self.allowed.contains(&ns))
    }
}

/// Accepts every page, including those without a namespace
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyNamespace;

impl NamespaceFilter for AnyNamespace {
    fn accepts(&self, _namespace: Option<i32>) -> bool {
        true
    }
}

impl<F> NamespaceFilter for F
where
    F: Fn(Option<i32>) -> bool + Send + Sync,
{
    fn accepts(&self, namespace: Option<i32>) -> bool {
        self(namespace)
    }
}
