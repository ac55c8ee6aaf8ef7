//! Attribute macros for the filament fiber runtime.
//!
//! Both macros turn a function into a synchronous one that builds a
//! runtime and runs the original body as the root fiber:
//!
//! ```rust,ignore
//! #[filament::main(worker_threads = 2)]
//! fn main(fiber: &Fiber) {
//!     fiber.yield_now().unwrap();
//! }
//! ```
//!
//! The function's single parameter, if any, names the fiber context; its
//! type annotation is ignored.

mod utils;

use proc_macro::{TokenStream, TokenTree};

#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    if let Err(msg) = utils::wrap_body(&mut tokens, &attr) {
        return utils::compile_error(&format!("filament::main: {msg}"));
    }

    tokens.into_iter().collect()
}

#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    if let Err(msg) = utils::wrap_body(&mut tokens, &attr) {
        return utils::compile_error(&format!("filament::test: {msg}"));
    }

    let test_attr: TokenStream = "#[test]".parse().unwrap_or_default();
    let mut result: Vec<TokenTree> = test_attr.into_iter().collect();
    result.extend(tokens);

    result.into_iter().collect()
}
