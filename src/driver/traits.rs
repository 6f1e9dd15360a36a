use crate::driver::Locator;
use anyhow::Result;
use async_trait::async_trait;

/// Opaque reference to a located element, valid until the next navigation.
///
/// A `NodeId` addresses the element's current position in the document, not
/// a live DOM node, so re-querying after a re-render yields the same logical
/// control even when the underlying node identity has changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// One browser session's document surface.
///
/// This trait is the entire contract between the interaction engine and the
/// browser: structural queries, property reads, and the small set of input
/// primitives the interaction protocols are built from.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the session to a URL.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Current document URL, for diagnostics.
    async fn current_url(&self) -> Result<String>;

    /// Current document title, for diagnostics and title waits.
    async fn title(&self) -> Result<String>;

    /// All elements currently matching the locator, in document order.
    async fn query(&self, locator: &Locator) -> Result<Vec<NodeId>>;

    /// All elements matching the locator within the subtree rooted at `node`.
    async fn query_within(&self, node: NodeId, locator: &Locator) -> Result<Vec<NodeId>>;

    /// Lowercased tag name.
    async fn tag_name(&self, node: NodeId) -> Result<String>;

    /// Visible text of the element: its value for inputs, inner text otherwise.
    async fn text(&self, node: NodeId) -> Result<String>;

    /// Attribute value, `None` when the attribute is absent.
    async fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>>;

    async fn is_displayed(&self, node: NodeId) -> Result<bool>;

    async fn is_enabled(&self, node: NodeId) -> Result<bool>;

    /// Native checked state; `false` for elements without one.
    async fn is_checked(&self, node: NodeId) -> Result<bool>;

    async fn click(&self, node: NodeId) -> Result<()>;

    /// Clear the element's current value via select-all + delete, which also
    /// works on inputs whose value is managed by script and survives a naive
    /// blank overwrite.
    async fn clear_text(&self, node: NodeId) -> Result<()>;

    /// Type text into the focused element, key by key.
    async fn type_text(&self, node: NodeId, text: &str) -> Result<()>;

    /// Dispatch synthetic `input`/`change` notifications, for host frameworks
    /// that only observe the value through those events.
    async fn dispatch_input_events(&self, node: NodeId) -> Result<()>;

    /// Scroll the element into view. Best effort.
    async fn scroll_into_view(&self, node: NodeId) -> Result<()>;

    /// Flash a visual highlight on the element. Purely cosmetic; callers
    /// swallow failures.
    async fn highlight(&self, node: NodeId) -> Result<()>;
}
