use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Parses the `worker_threads = N` argument of `main` and `test`.
///
/// Unknown arguments are ignored.
pub(crate) fn parse_worker_threads(attr: &TokenStream) -> Option<usize> {
    let attr_str = attr.to_string();
    let mut worker_threads = None;

    for part in attr_str.split(',') {
        let part = part.trim();
        if let Some(v) = part.strip_prefix("worker_threads") {
            let v = v.trim_start_matches(|c: char| c == '=' || c.is_whitespace());
            worker_threads = v.trim().parse::<usize>().ok();
        }
    }

    worker_threads
}

/// Builds the runtime constructor expression.
pub(crate) fn runtime_builder(worker_threads: Option<usize>) -> String {
    let mut builder = String::from("::filament::RuntimeBuilder::new()");

    if let Some(n) = worker_threads {
        builder.push_str(&format!(".worker_threads({})", n));
    }

    builder.push_str(".build()");
    builder
}

/// Removes the parameter list of the annotated function and returns the
/// pattern the fiber context should be bound to.
///
/// `fn main(fiber: &Fiber)` yields `fiber`; `fn main()` yields `_fiber`.
/// The parameter's type is ignored: the body always receives a
/// `&filament::Fiber<'_>`.
pub(crate) fn take_fiber_binding(tokens: &mut [TokenTree]) -> String {
    let fn_pos = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "fn"));

    let params_pos = fn_pos.and_then(|fn_pos| {
        tokens[fn_pos..]
            .iter()
            .position(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Parenthesis))
            .map(|offset| fn_pos + offset)
    });

    let Some(pos) = params_pos else {
        return "_fiber".to_owned();
    };

    let params: Vec<TokenTree> = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().into_iter().collect(),
        _ => Vec::new(),
    };

    let binding: Vec<TokenTree> = params
        .into_iter()
        .take_while(|t| !matches!(t, TokenTree::Punct(p) if p.as_char() == ':'))
        .collect();

    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Parenthesis, TokenStream::new()));

    if binding.is_empty() {
        "_fiber".to_owned()
    } else {
        tokens_to_string(&binding)
    }
}

/// Converts a slice of tokens into a Rust source string.
///
/// This function preserves token order and inserts spaces
/// between consecutive identifiers to avoid accidental
/// token merging (e.g. `mut fiber` vs `mutfiber`).
pub(crate) fn tokens_to_string(tokens: &[TokenTree]) -> String {
    let mut out = String::new();
    let mut prev_was_ident = false;

    for t in tokens {
        let s = t.to_string();

        let needs_space = prev_was_ident && matches!(t, TokenTree::Ident(_));

        if needs_space {
            out.push(' ');
        }

        out.push_str(&s);
        prev_was_ident = matches!(t, TokenTree::Ident(_));
    }

    out
}

/// Replaces the function body with one that runs the original body as the
/// root fiber of a fresh runtime.
///
/// The original body group is kept as-is so spans inside it survive.
pub(crate) fn wrap_body(tokens: &mut Vec<TokenTree>, attr: &TokenStream) -> Result<(), String> {
    let Some(pos) = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
    else {
        return Err("expected a function body".to_owned());
    };

    let binding = take_fiber_binding(tokens);
    let builder = runtime_builder(parse_worker_threads(attr));

    let body = tokens[pos].clone();

    let prelude: TokenStream = format!("let runtime = {builder}; runtime.block_on")
        .parse()
        .map_err(|err| format!("{err}"))?;

    let closure: TokenStream = format!("move |{binding}: &::filament::Fiber<'_>|")
        .parse()
        .map_err(|err| format!("{err}"))?;

    let mut args: Vec<TokenTree> = closure.into_iter().collect();
    args.push(body);

    let mut block: Vec<TokenTree> = prelude.into_iter().collect();
    block.push(TokenTree::Group(Group::new(
        Delimiter::Parenthesis,
        args.into_iter().collect(),
    )));

    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, block.into_iter().collect()));

    Ok(())
}

/// Emits a `compile_error!` carrying `msg`.
pub(crate) fn compile_error(msg: &str) -> TokenStream {
    format!("compile_error!({:?});", msg)
        .parse()
        .unwrap_or_default()
}
