//! livefeed view: binds a page's view state to the elements it drives.
//!
//! Each [`ElementBinding`] owns one selector. On load it may scrape bootstrap
//! values; on every transition it renders `(state, previous)` onto a [`Surface`]
//! and skips regions that did not change.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use livefeed_core::{Action, BootstrapFields, PageVariant, ViewState};
use livefeed_store::ListStore;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod bindings;
pub mod format;

pub use format::{format_count, parse_count};

/// One mutation of the rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum SurfaceOp {
    Show { selector: String },
    Hide { selector: String },
    SetText { selector: String, text: String },
    AddClass { selector: String, class: String },
    RemoveClass { selector: String, class: String },
}

/// Whatever the bindings render onto.
pub trait Surface: Send {
    fn show(&mut self, selector: &str);
    fn hide(&mut self, selector: &str);
    fn set_text(&mut self, selector: &str, text: &str);
    fn add_class(&mut self, selector: &str, class: &str);
    fn remove_class(&mut self, selector: &str, class: &str);
}

/// Surface that records every op, in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    pub ops: Vec<SurfaceOp>,
}

impl RecordingSurface {
    pub fn take(&mut self) -> Vec<SurfaceOp> { std::mem::take(&mut self.ops) }
}

impl Surface for RecordingSurface {
    fn show(&mut self, selector: &str) { self.ops.push(SurfaceOp::Show { selector: selector.into() }); }
    fn hide(&mut self, selector: &str) { self.ops.push(SurfaceOp::Hide { selector: selector.into() }); }
    fn set_text(&mut self, selector: &str, text: &str) {
        self.ops.push(SurfaceOp::SetText { selector: selector.into(), text: text.into() });
    }
    fn add_class(&mut self, selector: &str, class: &str) {
        self.ops.push(SurfaceOp::AddClass { selector: selector.into(), class: class.into() });
    }
    fn remove_class(&mut self, selector: &str, class: &str) {
        self.ops.push(SurfaceOp::RemoveClass { selector: selector.into(), class: class.into() });
    }
}

/// Text content scraped from the page at load time, keyed by selector.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ElementSnapshot {
    texts: FxHashMap<String, String>,
}

impl ElementSnapshot {
    pub fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn text(&self, selector: &str) -> Option<&str> { self.texts.get(selector).map(|s| s.as_str()) }
}

pub trait ElementBinding: Send {
    fn selector(&self) -> &str;

    fn load(&self, _page: &ElementSnapshot) -> Option<BootstrapFields> { None }

    fn render(&self, surface: &mut dyn Surface, state: &ViewState, prev: &ViewState);
}

/// The set of bindings for one page.
#[derive(Default)]
pub struct Binder {
    bindings: Vec<Box<dyn ElementBinding>>,
}

impl Binder {
    pub fn new() -> Self { Self::default() }

    pub fn for_variant(variant: PageVariant) -> Self {
        let mut b = Self::new();
        for binding in bindings::bindings_for(variant) {
            b.bind(binding);
        }
        b
    }

    pub fn bind(&mut self, binding: Box<dyn ElementBinding>) { self.bindings.push(binding); }

    pub fn selectors(&self) -> Vec<&str> { self.bindings.iter().map(|b| b.selector()).collect() }

    /// Merge what every binding scrapes into one bootstrap payload.
    pub fn load(&self, page: &ElementSnapshot) -> BootstrapFields {
        let mut out = BootstrapFields::default();
        for b in &self.bindings {
            if let Some(f) = b.load(page) {
                out.address_hash = f.address_hash.or(out.address_hash);
                out.filter = f.filter.or(out.filter);
                out.running_count = f.running_count.or(out.running_count);
            }
        }
        out
    }

    pub fn render(&self, surface: &mut dyn Surface, state: &ViewState, prev: &ViewState) {
        for b in &self.bindings {
            b.render(surface, state, prev);
        }
    }
}

/// Wire a binder to a store: dispatch scraped bootstrap values as `ELEMENTS_LOAD`,
/// render the current state once, then render every later transition.
pub fn connect<S: Surface + 'static>(
    store: &mut ListStore,
    binder: Binder,
    page: &ElementSnapshot,
    surface: S,
) -> Arc<Mutex<S>> {
    let fields = binder.load(page);
    if !fields.is_empty() {
        store.dispatch(Action::ElementsLoad(fields));
    }
    let surface = Arc::new(Mutex::new(surface));
    if let Ok(mut s) = surface.lock() {
        binder.render(&mut *s, &store.state(), &ViewState::default());
    }
    debug!(bindings = binder.bindings.len(), "view: binder connected");
    let target = Arc::clone(&surface);
    store.subscribe(Box::new(move |state: &ViewState, prev: &ViewState| {
        if let Ok(mut s) = target.lock() {
            binder.render(&mut *s, state, prev);
        }
    }));
    surface
}
