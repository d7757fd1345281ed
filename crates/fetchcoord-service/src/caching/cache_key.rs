use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identifies one fetchable resource instance.
///
/// A key consists of a resource name, an ordered list of path segments and a set of named
/// parameters. Two keys are equal iff all three are equal. Segment order matters, parameter order
/// does not, as parameters are kept sorted by name.
///
/// Keys are cheap to clone.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestKey {
    inner: Arc<KeyInner>,
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
struct KeyInner {
    resource: String,
    segments: Vec<String>,
    params: BTreeMap<String, String>,
}

impl RequestKey {
    /// Creates a key for a resource without any parameters.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::builder(resource).build()
    }

    /// Creates a [`RequestKeyBuilder`] for the given resource.
    pub fn builder(resource: impl Into<String>) -> RequestKeyBuilder {
        RequestKeyBuilder {
            resource: resource.into(),
            segments: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    /// The resource name, used to tag logs and metrics.
    pub fn resource(&self) -> &str {
        &self.inner.resource
    }

    /// The path segments, in the order they were added.
    pub fn segments(&self) -> &[String] {
        &self.inner.segments
    }

    /// Returns the value of a named parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner.params.get(name).map(String::as_str)
    }

    /// Iterates the named parameters, sorted by name.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.resource)?;
        for segment in &self.inner.segments {
            write!(f, "/{segment}")?;
        }
        let mut separator = '?';
        for (name, value) in &self.inner.params {
            write!(f, "{separator}{name}={value}")?;
            separator = '&';
        }
        Ok(())
    }
}

impl fmt::Debug for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestKey({self})")
    }
}

/// A builder for [`RequestKey`]s.
#[derive(Debug, Clone)]
pub struct RequestKeyBuilder {
    resource: String,
    segments: Vec<String>,
    params: BTreeMap<String, String>,
}

impl RequestKeyBuilder {
    /// Appends a path segment.
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Sets a named parameter, replacing an earlier value of the same name.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Finalize the [`RequestKey`].
    pub fn build(self) -> RequestKey {
        let Self {
            resource,
            segments,
            params,
        } = self;
        RequestKey {
            inner: Arc::new(KeyInner {
                resource,
                segments,
                params,
            }),
        }
    }
}
