//! # Standard Library Registry
//!
//! Pure (deterministic, no I/O) functions invoked from A0 source as
//! `name { args }`, organized into one submodule per category:
//!
//! - [`data`] (4): `parse.json`, `get`, `put`, `patch`
//! - [`predicates`] (7): `eq`, `contains`, `not`, `and`, `or`, `coalesce`, `typeof`
//! - [`lists`] (10): `len`, `append`, `concat`, `sort`, `filter` (`by` form),
//!   `find`, `range`, `join`, `unique`, `pluck`, `flat`
//! - [`strings`] (6): `str.concat`, `str.split`, `str.starts`, `str.ends`,
//!   `str.replace`, `str.template`
//! - [`records`] (4): `keys`, `values`, `merge`, `entries`
//! - [`math`] (2): `math.max`, `math.min`
//!
//! `map`, `reduce`, and the `fn`-form of `filter` are **not** registered here:
//! they resolve a user-defined function name against the evaluator's
//! `FunctionTable` and are implemented directly in `eval.rs` as special
//! forms that happen to share a name with this registry.

pub mod data;
pub mod lists;
pub mod math;
pub mod predicates;
pub mod records;
pub mod strings;

use crate::diagnostic::Diagnostic;
use crate::span::Span;
use crate::value::{Record, Value};

type StdlibFn = fn(&Record) -> Result<Value, String>;

/// Name-keyed lookup table. Built once and treated as read-only for the
/// duration of a run, same as `tools::ToolRegistry` (spec §5 "shared
/// resources").
pub struct StdlibRegistry {
    functions: std::collections::HashMap<&'static str, StdlibFn>,
}

impl StdlibRegistry {
    pub fn new() -> Self {
        let mut functions: std::collections::HashMap<&'static str, StdlibFn> = std::collections::HashMap::new();

        functions.insert("parse.json", data::parse_json);
        functions.insert("get", data::get);
        functions.insert("put", data::put);
        functions.insert("patch", data::patch);

        functions.insert("eq", predicates::eq);
        functions.insert("contains", predicates::contains);
        functions.insert("not", predicates::not);
        functions.insert("and", predicates::and);
        functions.insert("or", predicates::or);
        functions.insert("coalesce", predicates::coalesce);
        functions.insert("typeof", predicates::type_of);

        functions.insert("len", lists::len);
        functions.insert("append", lists::append);
        functions.insert("concat", lists::concat);
        functions.insert("sort", lists::sort);
        functions.insert("filter", lists::filter_by);
        functions.insert("find", lists::find);
        functions.insert("range", lists::range);
        functions.insert("join", lists::join);
        functions.insert("unique", lists::unique);
        functions.insert("pluck", lists::pluck);
        functions.insert("flat", lists::flat);

        functions.insert("str.concat", strings::concat);
        functions.insert("str.split", strings::split);
        functions.insert("str.starts", strings::starts);
        functions.insert("str.ends", strings::ends);
        functions.insert("str.replace", strings::replace);
        functions.insert("str.template", strings::template);

        functions.insert("keys", records::keys);
        functions.insert("values", records::values);
        functions.insert("merge", records::merge);
        functions.insert("entries", records::entries);

        functions.insert("math.max", math::max);
        functions.insert("math.min", math::min);

        StdlibRegistry { functions }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// All registered names, for the validator's stdlib/user-`fn` collision
    /// check. `map`/`reduce` are evaluator special forms rather than registry
    /// entries (`eval.rs`'s `eval_fn_call`) and are reserved the same way;
    /// callers building the validator's reserved-name set should add them.
    pub fn names(&self) -> std::collections::HashSet<String> {
        self.functions.keys().map(|s| s.to_string()).collect()
    }

    /// Calls the named stdlib function, mapping a raised error to `E_FN` and
    /// an unknown name to `E_UNKNOWN_FN`. `map`/`reduce`/
    /// `filter{fn:}` never reach this — `eval.rs` intercepts those before
    /// falling through to a generic stdlib dispatch.
    pub fn call(&self, name: &str, args: &Record, span: Span) -> Result<Value, Diagnostic> {
        let f = self.functions.get(name).ok_or_else(|| Diagnostic::unknown_fn(name, span.clone()))?;
        f(args).map_err(|message| Diagnostic::fn_error(name, message, span))
    }
}

impl Default for StdlibRegistry {
    fn default() -> Self {
        StdlibRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_a_known_function() {
        let registry = StdlibRegistry::new();
        let mut args = Record::new();
        args.insert("value", Value::Bool(false));
        let result = registry.call("not", &args, Span::point("t.a0", 1, 1)).unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn unknown_name_maps_to_unknown_fn_diagnostic() {
        let registry = StdlibRegistry::new();
        let err = registry.call("nope", &Record::new(), Span::point("t.a0", 1, 1)).unwrap_err();
        assert_eq!(err.code(), "E_UNKNOWN_FN");
    }

    #[test]
    fn function_error_maps_to_e_fn_diagnostic() {
        let registry = StdlibRegistry::new();
        let err = registry.call("len", &Record::new(), Span::point("t.a0", 1, 1)).unwrap_err();
        assert_eq!(err.code(), "E_FN");
    }

    #[test]
    fn map_reduce_and_filter_fn_form_are_not_registered() {
        let registry = StdlibRegistry::new();
        assert!(!registry.contains("map"));
        assert!(!registry.contains("reduce"));
    }
}
