//! Parsed HTML documents: sections fetched from the server and the live page
//! they get patched into.
//!
//! Both wrap a [`scraper::Html`] tree. Moving an element from a fetched
//! section into the live page copies its subtree node by node into the
//! page's arena, since `ego_tree` nodes cannot migrate between trees.

use ego_tree::{NodeId, Tree};
use scraper::{ElementRef, Html, Node, Selector};

use crate::types::{SectionError, SectionResult, SelectorOutcome};

/// Compile a CSS selector.
pub fn compile_selector(selector: &str) -> SectionResult<Selector> {
    Selector::parse(selector).map_err(|e| SectionError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// A section document returned by the server.
///
/// Owned by the call that fetched it. Elements moved into a [`LivePage`]
/// are detached from this tree.
#[derive(Debug, Clone)]
pub struct FetchedSection {
    html: Html,
}

impl FetchedSection {
    /// Parse markup as a full HTML document. Never fails; malformed markup is
    /// recovered the way a browser would.
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    /// The underlying parsed tree.
    pub fn document(&self) -> &Html {
        &self.html
    }

    /// Number of recoverable errors the parser reported.
    pub fn parse_error_count(&self) -> usize {
        self.html.errors.len()
    }

    /// Outer HTML of the first element matching `selector`.
    pub fn select_first_html(&self, selector: &str) -> SectionResult<Option<String>> {
        let selector = compile_selector(selector)?;
        Ok(outer_html(&self.html, &selector))
    }

    /// Serialize the whole document.
    pub fn html(&self) -> String {
        self.html.html()
    }

    fn first_match(&self, selector: &Selector) -> Option<NodeId> {
        first_match(&self.html, selector)
    }
}

impl From<Html> for FetchedSection {
    fn from(html: Html) -> Self {
        Self { html }
    }
}

/// The caller's live document.
#[derive(Debug, Clone)]
pub struct LivePage {
    html: Html,
}

impl LivePage {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    pub fn document(&self) -> &Html {
        &self.html
    }

    /// Outer HTML of the first element matching `selector`.
    pub fn select_first_html(&self, selector: &str) -> SectionResult<Option<String>> {
        let selector = compile_selector(selector)?;
        Ok(outer_html(&self.html, &selector))
    }

    /// Number of elements matching `selector`.
    pub fn count(&self, selector: &str) -> SectionResult<usize> {
        let selector = compile_selector(selector)?;
        Ok(document_elements(&self.html)
            .map(|root| {
                usize::from(selector.matches(&root)) + root.select(&selector).count()
            })
            .sum())
    }

    pub fn html(&self) -> String {
        self.html.html()
    }

    /// Replace the first live element matching `selector` with the first
    /// matching element of `fetched`.
    ///
    /// The new subtree is inserted where the old element stood and the old
    /// element is detached within the same `&mut` borrow. The fetched
    /// element is detached from `fetched` afterwards, so it cannot be
    /// matched again by a later selector. The page's arena is compacted so
    /// the replaced subtree does not linger in memory.
    pub fn replace(&mut self, selector: &Selector, fetched: &mut FetchedSection) -> SelectorOutcome {
        let Some(source) = fetched.first_match(selector) else {
            return SelectorOutcome::MissingInFetched;
        };
        let Some(target) = first_match(&self.html, selector) else {
            return SelectorOutcome::MissingInPage;
        };

        if graft_before(&fetched.html.tree, source, &mut self.html.tree, target).is_none() {
            return SelectorOutcome::MissingInPage;
        }
        if let Some(mut old) = self.html.tree.get_mut(target) {
            old.detach();
        }
        if let Some(mut moved) = fetched.html.tree.get_mut(source) {
            moved.detach();
        }
        self.compact();

        SelectorOutcome::Replaced
    }

    /// Rebuild the tree from the nodes still attached to the root.
    fn compact(&mut self) {
        let old = &self.html.tree;
        let root = old.root();
        let mut tree = Tree::new(root.value().clone());
        let new_root = tree.root().id();
        copy_children(old, root.id(), &mut tree, new_root);
        self.html.tree = tree;
    }
}

impl From<Html> for LivePage {
    fn from(html: Html) -> Self {
        Self { html }
    }
}

/// Top-level elements still attached to the document root.
fn document_elements(html: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    html.tree.root().children().filter_map(ElementRef::wrap)
}

/// First attached element matching `selector`, in document order.
///
/// Unlike `ElementRef::select`, the top-level element itself is a candidate,
/// and unlike `Html::root_element` this does not panic once the `<html>`
/// element has been moved out of a fetched document.
fn first_match(html: &Html, selector: &Selector) -> Option<NodeId> {
    document_elements(html)
        .find_map(|root| {
            if selector.matches(&root) {
                Some(root)
            } else {
                root.select(selector).next()
            }
        })
        .map(|el| el.id())
}

fn outer_html(html: &Html, selector: &Selector) -> Option<String> {
    let id = first_match(html, selector)?;
    html.tree
        .get(id)
        .and_then(ElementRef::wrap)
        .map(|el| el.html())
}

/// Copy the subtree at `src_id` into `dst` as the previous sibling of
/// `anchor`. Returns the id of the copied root.
fn graft_before(
    src: &Tree<Node>,
    src_id: NodeId,
    dst: &mut Tree<Node>,
    anchor: NodeId,
) -> Option<NodeId> {
    let value = src.get(src_id)?.value().clone();
    // Orphans have no sibling slot.
    dst.get(anchor)?.parent()?;
    let new_id = dst.get_mut(anchor)?.insert_before(value).id();
    copy_children(src, src_id, dst, new_id);
    Some(new_id)
}

fn copy_children(src: &Tree<Node>, src_id: NodeId, dst: &mut Tree<Node>, dst_id: NodeId) {
    let Some(src_node) = src.get(src_id) else {
        return;
    };
    for child in src_node.children() {
        let Some(mut parent) = dst.get_mut(dst_id) else {
            return;
        };
        let child_id = parent.append(child.value().clone()).id();
        copy_children(src, child.id(), dst, child_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Shop</title></head><body>
<header id="header">Old header</header>
<div id="cart" class="drawer"><span class="count">1</span></div>
<footer id="footer">Footer</footer>
</body></html>"#;

    #[test]
    fn test_invalid_selector_is_reported() {
        let err = compile_selector("div[").unwrap_err();
        match err {
            SectionError::InvalidSelector { selector, .. } => assert_eq!(selector, "div["),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fetched_section_queries() {
        let section = FetchedSection::parse(r#"<div id="cart"><span class="count">3</span></div>"#);
        let cart = section.select_first_html("#cart").unwrap().unwrap();
        assert!(cart.contains(r#"<span class="count">3</span>"#));
        assert!(section.select_first_html("#nope").unwrap().is_none());
    }

    #[test]
    fn test_replace_swaps_subtree_in_place() {
        let mut page = LivePage::parse(PAGE);
        let mut fetched =
            FetchedSection::parse(r#"<div id="cart" class="drawer open"><span class="count">4</span><a href="/checkout">Checkout</a></div>"#);
        let selector = compile_selector("#cart").unwrap();

        let outcome = page.replace(&selector, &mut fetched);
        assert_eq!(outcome, SelectorOutcome::Replaced);

        let html = page.html();
        assert!(html.contains(r#"class="drawer open""#));
        assert!(html.contains(r#"<a href="/checkout">Checkout</a>"#));
        assert!(!html.contains(r#"<span class="count">1</span>"#));
        assert_eq!(page.count("#cart").unwrap(), 1);

        // Neighbours keep their place.
        let header = html.find("Old header").unwrap();
        let cart = html.find("Checkout").unwrap();
        let footer = html.find("Footer").unwrap();
        assert!(header < cart && cart < footer);

        // The fetched element moved out of its own tree.
        assert!(fetched.select_first_html("#cart").unwrap().is_none());
    }

    #[test]
    fn test_replace_skips_when_fetched_lacks_match() {
        let mut page = LivePage::parse(PAGE);
        let before = page.html();
        let mut fetched = FetchedSection::parse("<p>nothing here</p>");
        let selector = compile_selector("#cart").unwrap();

        assert_eq!(
            page.replace(&selector, &mut fetched),
            SelectorOutcome::MissingInFetched
        );
        assert_eq!(page.html(), before);
    }

    #[test]
    fn test_replace_skips_when_page_lacks_match() {
        let mut page = LivePage::parse(PAGE);
        let before = page.html();
        let mut fetched = FetchedSection::parse(r#"<aside id="upsell">Buy more</aside>"#);
        let selector = compile_selector("#upsell").unwrap();

        assert_eq!(
            page.replace(&selector, &mut fetched),
            SelectorOutcome::MissingInPage
        );
        assert_eq!(page.html(), before);
        // Nothing was moved out of the fetched document.
        assert!(fetched.select_first_html("#upsell").unwrap().is_some());
    }

    #[test]
    fn test_only_first_match_is_replaced() {
        let mut page = LivePage::parse(
            r#"<body><p class="price">1</p><p class="price">2</p></body>"#,
        );
        let mut fetched = FetchedSection::parse(r#"<p class="price">9</p><p class="price">8</p>"#);
        let selector = compile_selector(".price").unwrap();

        assert_eq!(page.replace(&selector, &mut fetched), SelectorOutcome::Replaced);
        let html = page.html();
        assert!(html.contains(r#"<p class="price">9</p><p class="price">2</p>"#));
    }

    #[test]
    fn test_detached_nodes_do_not_match() {
        let mut page = LivePage::parse(PAGE);
        let mut fetched = FetchedSection::parse(r#"<div id="cart">new</div>"#);
        let selector = compile_selector("#cart").unwrap();
        page.replace(&selector, &mut fetched);

        let cart = page.select_first_html("#cart").unwrap().unwrap();
        assert_eq!(cart, r#"<div id="cart">new</div>"#);
    }

    #[test]
    fn test_repeated_replace_keeps_arena_size() {
        let mut page = LivePage::parse(r#"<body><div id="cart"><span>1</span></div></body>"#);
        let selector = compile_selector("#cart").unwrap();
        let markup = r#"<div id="cart"><span>1</span></div>"#;

        let mut fetched = FetchedSection::parse(markup);
        page.replace(&selector, &mut fetched);
        let settled = page.document().tree.nodes().count();

        for _ in 0..5 {
            let mut fetched = FetchedSection::parse(markup);
            assert_eq!(page.replace(&selector, &mut fetched), SelectorOutcome::Replaced);
            assert_eq!(page.document().tree.nodes().count(), settled);
        }
        assert_eq!(page.count("#cart").unwrap(), 1);
    }

    #[test]
    fn test_html_selector_replaces_whole_document() {
        let mut page = LivePage::parse("<p id=\"old\">old</p>");
        let mut fetched = FetchedSection::parse("<p id=\"new\">new</p>");
        let selector = compile_selector("html").unwrap();

        assert_eq!(page.replace(&selector, &mut fetched), SelectorOutcome::Replaced);
        assert!(page.select_first_html("#new").unwrap().is_some());
        assert!(page.select_first_html("#old").unwrap().is_none());
        // The fetched document lost its root element without panicking.
        assert!(fetched.select_first_html("p").unwrap().is_none());
    }
}
