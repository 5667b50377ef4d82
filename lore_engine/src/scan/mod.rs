//! The bounded text window entries are matched against.

use lore_book::{MatchScope, ScanContext};

/// Hard limit on how many recent messages are ever scanned.
pub const MAX_SCAN_DEPTH: usize = 1000;

/// Byte cap of the recursion buffer. Older text is dropped first.
pub const MAX_RECURSE_BYTES: usize = 256 * 1024;

/// Separates scanned segments so keys cannot match across message borders.
pub const SCAN_JOINER: &str = "\n\u{1}";

/// Kind of scan pass being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// First pass of a turn.
    Initial,
    /// Re-scan including content activated by earlier passes.
    Recursion,
    /// Deeper re-scan to reach a minimum activation count.
    MinActivations,
}

impl PassKind {
    pub fn is_recursive(&self) -> bool {
        matches!(self, PassKind::Recursion)
    }
}

/// Recent messages plus context, injects, and recursively activated text.
#[derive(Debug, Clone)]
pub struct ScanBuffer<'a> {
    /// Newest first.
    messages: Vec<String>,
    context: &'a ScanContext,
    default_depth: usize,
    skew: usize,
    injects: Vec<String>,
    recurse: String,
}

impl<'a> ScanBuffer<'a> {
    /// Build from chat messages given oldest first.
    pub fn new(messages: &[String], context: &'a ScanContext, default_depth: usize) -> Self {
        let messages = messages
            .iter()
            .rev()
            .take(MAX_SCAN_DEPTH)
            .cloned()
            .collect();

        Self {
            messages,
            context,
            default_depth,
            skew: 0,
            injects: Vec::new(),
            recurse: String::new(),
        }
    }

    /// Current default depth, including skew.
    pub fn depth(&self) -> usize {
        self.default_depth + self.skew
    }

    /// Number of messages held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn skew(&self) -> usize {
        self.skew
    }

    /// Text an entry with the given depth override and scope is matched against.
    pub fn get(&self, scan_depth: Option<usize>, scope: &MatchScope, pass: PassKind) -> String {
        let depth = scan_depth.unwrap_or_else(|| self.depth()).min(MAX_SCAN_DEPTH);
        if depth == 0 {
            return String::new();
        }

        let mut segments: Vec<&str> = self
            .messages
            .iter()
            .take(depth)
            .map(String::as_str)
            .filter(|m| !m.is_empty())
            .collect();

        segments.extend(self.context.selected(scope));
        segments.extend(self.injects.iter().map(String::as_str));

        if pass != PassKind::MinActivations && !self.recurse.is_empty() {
            segments.push(&self.recurse);
        }

        segments.join(SCAN_JOINER)
    }

    /// Append activated content for recursive passes.
    pub fn add_recurse(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.recurse.is_empty() {
            self.recurse.push('\n');
        }
        self.recurse.push_str(text);

        if self.recurse.len() > MAX_RECURSE_BYTES {
            let mut start = self.recurse.len() - MAX_RECURSE_BYTES;
            while !self.recurse.is_char_boundary(start) {
                start += 1;
            }
            self.recurse.replace_range(..start, "");
        }
    }

    /// Queue externally injected text (scanned on every pass).
    pub fn add_inject(&mut self, text: impl Into<String>) {
        self.injects.push(text.into());
    }

    /// Widen the default depth by one for the next pass.
    pub fn advance_scan(&mut self) {
        self.skew += 1;
    }

    pub fn has_recurse(&self) -> bool {
        !self.recurse.is_empty()
    }

    pub fn recurse_text(&self) -> &str {
        &self.recurse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(list: &[&str]) -> Vec<String> {
        list.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_get_takes_most_recent_messages() {
        let context = ScanContext::new();
        let buffer = ScanBuffer::new(&messages(&["oldest", "middle", "newest"]), &context, 2);
        let text = buffer.get(None, &MatchScope::default(), PassKind::Initial);

        assert_eq!(text, format!("newest{SCAN_JOINER}middle"));
    }

    #[test]
    fn test_zero_depth_is_empty() {
        let context = ScanContext::new();
        let buffer = ScanBuffer::new(&messages(&["hello"]), &context, 0);
        assert!(buffer.get(None, &MatchScope::default(), PassKind::Initial).is_empty());
        assert_eq!(buffer.get(Some(1), &MatchScope::default(), PassKind::Initial), "hello");
    }

    #[test]
    fn test_skips_empty_messages() {
        let context = ScanContext::new();
        let buffer = ScanBuffer::new(&messages(&["a", "", "b"]), &context, 3);
        assert_eq!(
            buffer.get(None, &MatchScope::default(), PassKind::Initial),
            format!("b{SCAN_JOINER}a")
        );
    }

    #[test]
    fn test_scope_and_injects_are_appended() {
        let context = ScanContext {
            scenario: "stormy coast".to_string(),
            ..ScanContext::default()
        };
        let mut buffer = ScanBuffer::new(&messages(&["hi"]), &context, 1);
        buffer.add_inject("an inject");

        let scope = MatchScope {
            scenario: true,
            ..MatchScope::default()
        };
        let text = buffer.get(None, &scope, PassKind::Initial);
        assert!(text.contains("stormy coast"));
        assert!(text.ends_with("an inject"));

        let plain = buffer.get(None, &MatchScope::default(), PassKind::Initial);
        assert!(!plain.contains("stormy coast"));
    }

    #[test]
    fn test_recursion_buffer_skipped_on_min_activation_pass() {
        let context = ScanContext::new();
        let mut buffer = ScanBuffer::new(&messages(&["hi"]), &context, 1);
        buffer.add_recurse("wolf");
        buffer.add_recurse("bear");

        let scope = MatchScope::default();
        assert!(buffer.get(None, &scope, PassKind::Recursion).ends_with("wolf\nbear"));
        assert!(!buffer.get(None, &scope, PassKind::MinActivations).contains("wolf"));
    }

    #[test]
    fn test_advance_scan_widens_depth() {
        let context = ScanContext::new();
        let mut buffer = ScanBuffer::new(&messages(&["a", "b"]), &context, 1);
        assert_eq!(buffer.get(None, &MatchScope::default(), PassKind::Initial), "b");

        buffer.advance_scan();
        assert_eq!(buffer.depth(), 2);
        assert_eq!(buffer.skew(), 1);
        assert!(buffer.get(None, &MatchScope::default(), PassKind::Initial).contains('a'));
        // Explicit overrides ignore skew.
        assert_eq!(buffer.get(Some(1), &MatchScope::default(), PassKind::Initial), "b");
    }

    #[test]
    fn test_recurse_buffer_keeps_tail_on_char_boundary() {
        let context = ScanContext::new();
        let mut buffer = ScanBuffer::new(&[], &context, 1);
        buffer.add_recurse(&"é".repeat(MAX_RECURSE_BYTES));
        buffer.add_recurse("tail");

        let text = buffer.recurse_text();
        assert!(text.len() <= MAX_RECURSE_BYTES);
        assert!(text.ends_with("\ntail"));
        assert!(text.starts_with('é'));
    }

    #[test]
    fn test_message_window_is_capped() {
        let context = ScanContext::new();
        let many: Vec<String> = (0..MAX_SCAN_DEPTH + 10).map(|i| i.to_string()).collect();
        let buffer = ScanBuffer::new(&many, &context, 5);
        assert_eq!(buffer.len(), MAX_SCAN_DEPTH);
    }
}
