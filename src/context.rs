use crate::attr::Attr;
use std::sync::Arc;

/// Attributes carried alongside a single log call.
///
/// Handlers read them at render time and never retain them; pass the
/// context again on every call that needs them.
#[derive(Debug, Clone)]
pub struct LogContext {
    attrs: Arc<[Attr]>,
}

impl Default for LogContext {
    fn default() -> Self {
        LogContext {
            attrs: Arc::from(Vec::new()),
        }
    }
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a context holding the existing attributes followed by `attrs`.
    ///
    /// The receiver is left untouched, so sibling contexts derived from the
    /// same parent never see each other's additions.
    pub fn append_attrs(&self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        let mut attrs = attrs.into_iter().peekable();
        if attrs.peek().is_none() {
            return self.clone();
        }

        let merged: Vec<Attr> = self.attrs.iter().cloned().chain(attrs).collect();
        LogContext {
            attrs: merged.into(),
        }
    }

    pub fn attrs(&self) -> &[Attr] {
        &self.attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_order_and_parent() {
        let parent = LogContext::new().append_attrs([Attr::string("a", "1")]);
        let left = parent.append_attrs([Attr::string("b", "2")]);
        let right = parent.append_attrs([Attr::string("c", "3")]);

        let keys = |ctx: &LogContext| ctx.attrs().iter().map(|a| a.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&parent), ["a"]);
        assert_eq!(keys(&left), ["a", "b"]);
        assert_eq!(keys(&right), ["a", "c"]);
    }

    #[test]
    fn append_nothing_is_noop() {
        let ctx = LogContext::new().append_attrs(Vec::new());
        assert!(ctx.attrs().is_empty());
    }
}
