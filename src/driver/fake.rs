//! In-memory DOM implementing [`BrowserSession`] for hermetic engine tests
//!
//! Supports the subset of CSS the engine's heuristics actually use: a tag
//! name, `#id`, `.class` (token match), `[attr]`, `[attr='v']`,
//! `[attr*='v']`, and comma-separated unions of those. XPath locators match
//! nothing, as they would need a real document.
//!
//! Stateful widget behavior (calendars that advance on a navigation click,
//! dropdowns that open on a trigger click) is modeled with per-node click
//! hooks registered by the test.

use crate::driver::traits::{BrowserSession, NodeId};
use crate::driver::Locator;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct NodeData {
    pub tag: String,
    pub attrs: HashMap<String, String>,
    pub text: String,
    pub value: String,
    pub parent: Option<usize>,
    pub displayed: bool,
    pub enabled: bool,
    pub checked: bool,
    pub clicks: u32,
    pub input_events: u32,
}

type ClickHook = Box<dyn Fn(&mut Vec<NodeData>) + Send + Sync>;

pub struct FakeDom {
    nodes: Mutex<Vec<NodeData>>,
    hooks: Mutex<HashMap<usize, ClickHook>>,
    url: Mutex<String>,
    title: Mutex<String>,
}

impl FakeDom {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
            hooks: Mutex::new(HashMap::new()),
            url: Mutex::new("about:blank".to_string()),
            title: Mutex::new(String::new()),
        }
    }

    pub fn add(&self, parent: Option<NodeId>, tag: &str, attrs: &[(&str, &str)], text: &str) -> NodeId {
        let mut nodes = self.nodes.lock().unwrap();
        let id = nodes.len();
        nodes.push(NodeData {
            tag: tag.to_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: text.to_string(),
            parent: parent.map(|p| p.0 as usize),
            displayed: true,
            enabled: true,
            ..NodeData::default()
        });
        NodeId(id as u64)
    }

    pub fn set_attr(&self, node: NodeId, name: &str, value: &str) {
        self.nodes.lock().unwrap()[node.0 as usize]
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        self.nodes.lock().unwrap()[node.0 as usize].text = text.to_string();
    }

    pub fn set_displayed(&self, node: NodeId, displayed: bool) {
        self.nodes.lock().unwrap()[node.0 as usize].displayed = displayed;
    }

    pub fn set_enabled(&self, node: NodeId, enabled: bool) {
        self.nodes.lock().unwrap()[node.0 as usize].enabled = enabled;
    }

    pub fn set_checked(&self, node: NodeId, checked: bool) {
        self.nodes.lock().unwrap()[node.0 as usize].checked = checked;
    }

    pub fn set_value(&self, node: NodeId, value: &str) {
        self.nodes.lock().unwrap()[node.0 as usize].value = value.to_string();
    }

    pub fn set_title(&self, title: &str) {
        *self.title.lock().unwrap() = title.to_string();
    }

    pub fn clicks(&self, node: NodeId) -> u32 {
        self.nodes.lock().unwrap()[node.0 as usize].clicks
    }

    pub fn value(&self, node: NodeId) -> String {
        self.nodes.lock().unwrap()[node.0 as usize].value.clone()
    }

    pub fn input_events(&self, node: NodeId) -> u32 {
        self.nodes.lock().unwrap()[node.0 as usize].input_events
    }

    pub fn checked(&self, node: NodeId) -> bool {
        self.nodes.lock().unwrap()[node.0 as usize].checked
    }

    /// Run `hook` instead of the built-in behavior when `node` is clicked.
    pub fn on_click(&self, node: NodeId, hook: impl Fn(&mut Vec<NodeData>) + Send + Sync + 'static) {
        self.hooks
            .lock()
            .unwrap()
            .insert(node.0 as usize, Box::new(hook));
    }

    fn displayed_with_ancestors(nodes: &[NodeData], mut idx: usize) -> bool {
        loop {
            if !nodes[idx].displayed {
                return false;
            }
            match nodes[idx].parent {
                Some(parent) => idx = parent,
                None => return true,
            }
        }
    }

    fn is_descendant(nodes: &[NodeData], mut idx: usize, ancestor: usize) -> bool {
        while let Some(parent) = nodes[idx].parent {
            if parent == ancestor {
                return true;
            }
            idx = parent;
        }
        false
    }

    fn matching_indices(&self, locator: &Locator, within: Option<usize>) -> Vec<usize> {
        let selectors = match locator {
            Locator::Css(css) => parse_selector_list(css),
            Locator::Id(id) => vec![SimpleSelector {
                attrs: vec![AttrMatch::Exact("id".into(), id.clone())],
                ..SimpleSelector::default()
            }],
            Locator::Name(name) => vec![SimpleSelector {
                attrs: vec![AttrMatch::Exact("name".into(), name.clone())],
                ..SimpleSelector::default()
            }],
            Locator::Tag(tag) => vec![SimpleSelector {
                tag: Some(tag.to_lowercase()),
                ..SimpleSelector::default()
            }],
            Locator::XPath(_) => return Vec::new(),
        };

        let nodes = self.nodes.lock().unwrap();
        (0..nodes.len())
            .filter(|&i| within.map_or(true, |root| Self::is_descendant(&nodes, i, root)))
            .filter(|&i| selectors.iter().any(|s| s.matches(&nodes[i])))
            .collect()
    }
}

#[async_trait]
impl BrowserSession for FakeDom {
    async fn goto(&self, url: &str) -> Result<()> {
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.title.lock().unwrap().clone())
    }

    async fn query(&self, locator: &Locator) -> Result<Vec<NodeId>> {
        Ok(self
            .matching_indices(locator, None)
            .into_iter()
            .map(|i| NodeId(i as u64))
            .collect())
    }

    async fn query_within(&self, node: NodeId, locator: &Locator) -> Result<Vec<NodeId>> {
        Ok(self
            .matching_indices(locator, Some(node.0 as usize))
            .into_iter()
            .map(|i| NodeId(i as u64))
            .collect())
    }

    async fn tag_name(&self, node: NodeId) -> Result<String> {
        Ok(self.nodes.lock().unwrap()[node.0 as usize].tag.clone())
    }

    async fn text(&self, node: NodeId) -> Result<String> {
        let nodes = self.nodes.lock().unwrap();
        let data = &nodes[node.0 as usize];
        if !data.value.is_empty() {
            Ok(data.value.clone())
        } else {
            Ok(data.text.clone())
        }
    }

    async fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        Ok(self.nodes.lock().unwrap()[node.0 as usize]
            .attrs
            .get(name)
            .cloned())
    }

    async fn is_displayed(&self, node: NodeId) -> Result<bool> {
        let nodes = self.nodes.lock().unwrap();
        Ok(Self::displayed_with_ancestors(&nodes, node.0 as usize))
    }

    async fn is_enabled(&self, node: NodeId) -> Result<bool> {
        Ok(self.nodes.lock().unwrap()[node.0 as usize].enabled)
    }

    async fn is_checked(&self, node: NodeId) -> Result<bool> {
        Ok(self.nodes.lock().unwrap()[node.0 as usize].checked)
    }

    async fn click(&self, node: NodeId) -> Result<()> {
        let idx = node.0 as usize;
        {
            let mut nodes = self.nodes.lock().unwrap();
            let data = nodes.get_mut(idx).context("Unknown element reference")?;
            data.clicks += 1;
        }

        let hooks = self.hooks.lock().unwrap();
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(hook) = hooks.get(&idx) {
            hook(&mut nodes);
        } else if nodes[idx].tag == "input"
            && nodes[idx].attrs.get("type").map(String::as_str) == Some("checkbox")
        {
            nodes[idx].checked = !nodes[idx].checked;
        }
        Ok(())
    }

    async fn clear_text(&self, node: NodeId) -> Result<()> {
        self.nodes.lock().unwrap()[node.0 as usize].value.clear();
        Ok(())
    }

    async fn type_text(&self, node: NodeId, text: &str) -> Result<()> {
        self.nodes.lock().unwrap()[node.0 as usize]
            .value
            .push_str(text);
        Ok(())
    }

    async fn dispatch_input_events(&self, node: NodeId) -> Result<()> {
        self.nodes.lock().unwrap()[node.0 as usize].input_events += 1;
        Ok(())
    }

    async fn scroll_into_view(&self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    async fn highlight(&self, _node: NodeId) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct SimpleSelector {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

enum AttrMatch {
    Present(String),
    Exact(String, String),
    Contains(String, String),
}

impl SimpleSelector {
    fn matches(&self, node: &NodeData) -> bool {
        if let Some(ref tag) = self.tag {
            if node.tag != *tag {
                return false;
            }
        }
        let class_attr = node.attrs.get("class").map(String::as_str).unwrap_or("");
        for class in &self.classes {
            if !class_attr.split_whitespace().any(|t| t == class) {
                return false;
            }
        }
        for attr in &self.attrs {
            let ok = match attr {
                AttrMatch::Present(name) => node.attrs.contains_key(name),
                AttrMatch::Exact(name, value) => {
                    node.attrs.get(name).map(String::as_str) == Some(value.as_str())
                }
                AttrMatch::Contains(name, value) => node
                    .attrs
                    .get(name)
                    .is_some_and(|v| v.contains(value.as_str())),
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

fn parse_selector_list(css: &str) -> Vec<SimpleSelector> {
    css.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_simple_selector)
        .collect()
}

fn parse_simple_selector(part: &str) -> SimpleSelector {
    let mut selector = SimpleSelector::default();
    let mut rest = part;

    // Leading tag name
    let tag_end = rest
        .find(|c| c == '.' || c == '#' || c == '[')
        .unwrap_or(rest.len());
    if tag_end > 0 {
        selector.tag = Some(rest[..tag_end].to_lowercase());
    }
    rest = &rest[tag_end..];

    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix('.') {
            let end = stripped
                .find(|c| c == '.' || c == '#' || c == '[')
                .unwrap_or(stripped.len());
            selector.classes.push(stripped[..end].to_string());
            rest = &stripped[end..];
        } else if let Some(stripped) = rest.strip_prefix('#') {
            let end = stripped
                .find(|c| c == '.' || c == '#' || c == '[')
                .unwrap_or(stripped.len());
            selector
                .attrs
                .push(AttrMatch::Exact("id".into(), stripped[..end].to_string()));
            rest = &stripped[end..];
        } else if let Some(stripped) = rest.strip_prefix('[') {
            let end = stripped.find(']').unwrap_or(stripped.len());
            let body = &stripped[..end];
            selector.attrs.push(parse_attr_match(body));
            rest = stripped.get(end + 1..).unwrap_or("");
        } else {
            break;
        }
    }

    selector
}

fn parse_attr_match(body: &str) -> AttrMatch {
    let unquote = |v: &str| v.trim_matches(|c| c == '\'' || c == '"').to_string();
    if let Some((name, value)) = body.split_once("*=") {
        AttrMatch::Contains(name.trim().to_string(), unquote(value.trim()))
    } else if let Some((name, value)) = body.split_once('=') {
        AttrMatch::Exact(name.trim().to_string(), unquote(value.trim()))
    } else {
        AttrMatch::Present(body.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn css_matching_covers_heuristic_shapes() {
        let dom = FakeDom::new();
        let root = dom.add(None, "body", &[], "");
        let button = dom.add(Some(root), "button", &[("class", "datepicker-next nav")], "");
        let cell = dom.add(Some(root), "td", &[("data-day", "5"), ("class", "day")], "5");

        let by_class = dom.query(&Locator::css(".nav")).await.unwrap();
        assert_eq!(by_class, vec![button]);

        let by_contains = dom.query(&Locator::css("[class*='next']")).await.unwrap();
        assert_eq!(by_contains, vec![button]);

        let by_attr = dom.query(&Locator::css("[data-day='5']")).await.unwrap();
        assert_eq!(by_attr, vec![cell]);

        let union = dom.query(&Locator::css("button, td")).await.unwrap();
        assert_eq!(union, vec![button, cell]);

        let tag_attr = dom.query(&Locator::css("td[data-day]")).await.unwrap();
        assert_eq!(tag_attr, vec![cell]);
    }

    #[tokio::test]
    async fn hidden_ancestor_hides_descendants() {
        let dom = FakeDom::new();
        let menu = dom.add(None, "ul", &[("class", "dropdown-menu")], "");
        let item = dom.add(Some(menu), "li", &[], "Red");
        dom.set_displayed(menu, false);
        assert!(!dom.is_displayed(item).await.unwrap());
    }

    #[tokio::test]
    async fn checkbox_click_flips_checked() {
        let dom = FakeDom::new();
        let cb = dom.add(None, "input", &[("type", "checkbox")], "");
        dom.click(cb).await.unwrap();
        assert!(dom.is_checked(cb).await.unwrap());
        dom.click(cb).await.unwrap();
        assert!(!dom.is_checked(cb).await.unwrap());
    }
}
