//! Dataverse agent web frontend
//!
//! Leptos CSR chat client: streams runs from the host, folds events into a
//! transcript, and renders tool calls as cards.

mod api;
mod app;
mod components;
mod dispatch;
mod pages;
mod state;
mod theme;

pub use app::App;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    leptos::mount::mount_to_body(App);
}
