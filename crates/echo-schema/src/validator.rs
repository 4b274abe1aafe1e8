use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate};
use echo_types::ObjectType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::registry::SchemaRegistry;
use crate::signature::{
    signature_of, SignatureCheck, SignatureVerifier, PLACEHOLDER_SIGNATURE, SIGNATURE_FIELD,
};

const ROOT: &str = "(root)";
const MAX_DEPTH: usize = 64;
const NO_ITEMS: &[Value] = &[];
/// Keywords whose values are instance data, not subschemas.
const DATA_KEYWORDS: &[&str] = &["enum", "const", "default", "examples"];

/// One structural violation: where it is and what is wrong.
///
/// `path` is the dotted location inside the instance (`outcome_metrics.stability_score`,
/// `problem_embedding.3`), or `(root)` for the object itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// An error about the object as a whole.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new(ROOT, message)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Index(usize),
    Key(String),
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Index(a), Self::Index(b)) => a.cmp(b),
            (Self::Key(a), Self::Key(b)) => a.cmp(b),
            (Self::Index(_), Self::Key(_)) => Ordering::Less,
            (Self::Key(_), Self::Index(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Violation {
    at: Vec<Segment>,
    message: String,
}

/// Instance locations an applicator looked at, feeding `unevaluated*`.
#[derive(Default)]
struct Evaluated {
    keys: HashSet<String>,
    items: HashSet<usize>,
}

impl Evaluated {
    fn merge(&mut self, other: Evaluated) {
        self.keys.extend(other.keys);
        self.items.extend(other.items);
    }
}

/// Base URI for relative `$ref`s and how far down the schema the walk is.
#[derive(Clone, Copy)]
struct Scope<'b> {
    base: &'b str,
    depth: usize,
}

impl Scope<'_> {
    fn deeper(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }
}

/// Structural validator over a draft 2020-12 JSON-Schema document.
///
/// References resolve inside the document: JSON pointers, `$anchor`s, and
/// `$id`-scoped URIs (absolute or relative to the enclosing `$id`).
/// Applicators cover `allOf`, `anyOf`, `oneOf`, `not`, `if`/`then`/`else`,
/// `dependentSchemas`, `properties`, `patternProperties`,
/// `additionalProperties`, `propertyNames`, `prefixItems`, `items`,
/// `contains` and both `unevaluated*` keywords. Older spellings (array
/// `items` with `additionalItems`, `dependencies`) are honoured. `format` is
/// an annotation unless assertion is switched on. Unknown keywords are
/// ignored.
///
/// Every violation is collected; validation never stops at the first one.
pub struct Validator<'s> {
    root: &'s Value,
    assert_format: bool,
    patterns: HashMap<String, Regex>,
    /// Resource URI to the resource and the base it was declared under.
    resources: HashMap<String, (&'s Value, String)>,
    anchors: HashMap<String, &'s Value>,
}

impl<'s> Validator<'s> {
    /// Index `schema` and compile its patterns.
    ///
    /// A `pattern` or `patternProperties` key the regex engine cannot compile
    /// is a fault in the schema, reported here rather than against values.
    pub fn new(schema: &'s Value) -> SchemaResult<Self> {
        let mut validator = Self {
            root: schema,
            assert_format: false,
            patterns: HashMap::new(),
            resources: HashMap::new(),
            anchors: HashMap::new(),
        };
        validator.resources.insert(String::new(), (schema, String::new()));
        validator.index(schema, "")?;
        Ok(validator)
    }

    /// Treat `format: date-time` and `format: date` as assertions.
    pub fn with_format_assertion(mut self, on: bool) -> Self {
        self.assert_format = on;
        self
    }

    /// All violations of `instance`, ordered by location.
    pub fn validate(&self, instance: &Value) -> Vec<FieldError> {
        let mut out = Vec::new();
        let mut at = Vec::new();
        self.walk(self.root, instance, Scope { base: "", depth: 0 }, &mut at, &mut out);
        out.sort_by(|a, b| a.at.cmp(&b.at));
        out.into_iter()
            .map(|v| FieldError::new(render_path(&v.at), v.message))
            .collect()
    }

    /// Whether `instance` has no violations.
    pub fn is_valid(&self, instance: &Value) -> bool {
        let mut out = Vec::new();
        self.walk(self.root, instance, Scope { base: "", depth: 0 }, &mut Vec::new(), &mut out);
        out.is_empty()
    }

    fn index(&mut self, node: &'s Value, base: &str) -> SchemaResult<()> {
        match node {
            Value::Array(items) => {
                for item in items {
                    self.index(item, base)?;
                }
            }
            Value::Object(map) => {
                let mut scope = base.to_string();
                if let Some(id) = map.get("$id").and_then(Value::as_str) {
                    scope = join_uri(base, id);
                    self.resources.insert(scope.clone(), (node, base.to_string()));
                }
                if let Some(anchor) = map.get("$anchor").and_then(Value::as_str) {
                    self.anchors.insert(format!("{scope}#{anchor}"), node);
                }
                if let Some(pattern) = map.get("pattern").and_then(Value::as_str) {
                    self.compile(pattern)?;
                }
                if let Some(patterns) = map.get("patternProperties").and_then(Value::as_object) {
                    for pattern in patterns.keys() {
                        self.compile(pattern)?;
                    }
                }
                for (key, value) in map {
                    if !DATA_KEYWORDS.contains(&key.as_str()) {
                        self.index(value, &scope)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn compile(&mut self, pattern: &str) -> SchemaResult<()> {
        if self.patterns.contains_key(pattern) {
            return Ok(());
        }
        let compiled = Regex::new(pattern).map_err(|e| SchemaError::UnsupportedPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.patterns.insert(pattern.to_string(), compiled);
        Ok(())
    }

    fn walk(
        &self,
        schema: &Value,
        instance: &Value,
        scope: Scope<'_>,
        at: &mut Vec<Segment>,
        out: &mut Vec<Violation>,
    ) -> Evaluated {
        let mut seen = Evaluated::default();
        let schema = match schema {
            Value::Bool(true) => return seen,
            Value::Bool(false) => {
                push(out, at, format!("False schema does not allow {}", repr(instance)));
                return seen;
            }
            Value::Object(map) => map,
            _ => return seen,
        };
        if scope.depth > MAX_DEPTH {
            push(out, at, "schema nesting too deep".to_string());
            return seen;
        }

        let rebased;
        let scope = match schema.get("$id").and_then(Value::as_str) {
            Some(id) => {
                rebased = join_uri(scope.base, id);
                Scope {
                    base: &rebased,
                    depth: scope.depth,
                }
            }
            None => scope,
        };

        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            match self.lookup(scope.base, reference) {
                Some((target, base)) => {
                    let inner = Scope {
                        base: &base,
                        depth: scope.depth + 1,
                    };
                    seen.merge(self.walk(target, instance, inner, at, out));
                }
                None => push(out, at, format!("cannot resolve $ref '{reference}'")),
            }
        }

        self.check_type(schema, instance, at, out);
        self.check_enum_const(schema, instance, at, out);
        seen.merge(self.check_combinators(schema, instance, scope, at, out));
        seen.merge(self.check_conditional(schema, instance, scope, at, out));

        match instance {
            Value::Object(map) => {
                seen.merge(self.check_object(schema, map, scope, at, out));
                self.check_unevaluated_properties(schema, map, &mut seen, scope, at, out);
            }
            Value::Array(items) => {
                seen.merge(self.check_array(schema, items, scope, at, out));
                self.check_unevaluated_items(schema, items, &mut seen, scope, at, out);
            }
            Value::String(s) => self.check_string(schema, s, at, out),
            Value::Number(_) => check_number(schema, instance, at, out),
            _ => {}
        }
        seen
    }

    /// Resolve `reference` against `base`: the target schema and the base
    /// URI to walk it under.
    fn lookup(&self, base: &str, reference: &str) -> Option<(&'s Value, String)> {
        let (uri, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let resource_uri = if uri.is_empty() {
            base.to_string()
        } else {
            join_uri(base, uri)
        };
        let (resource, parent) = self.resources.get(&resource_uri)?;
        let resource: &'s Value = *resource;
        if fragment.is_empty() {
            return Some((resource, parent.clone()));
        }
        let target = if fragment.starts_with('/') {
            resource.pointer(fragment)?
        } else {
            *self.anchors.get(&format!("{resource_uri}#{fragment}"))?
        };
        Some((target, resource_uri))
    }

    fn check_type(&self, schema: &Map<String, Value>, instance: &Value, at: &[Segment], out: &mut Vec<Violation>) {
        let expected: Vec<&str> = match schema.get("type") {
            Some(Value::String(t)) => vec![t.as_str()],
            Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
            _ => return,
        };
        if expected.is_empty() || expected.iter().any(|t| is_type(instance, t)) {
            return;
        }
        let names = expected
            .iter()
            .map(|t| format!("'{t}'"))
            .collect::<Vec<_>>()
            .join(", ");
        push(out, at, format!("{} is not of type {names}", repr(instance)));
    }

    fn check_enum_const(&self, schema: &Map<String, Value>, instance: &Value, at: &[Segment], out: &mut Vec<Violation>) {
        if let Some(Value::Array(options)) = schema.get("enum") {
            if !options.iter().any(|o| json_eq(o, instance)) {
                push(out, at, format!("{} is not one of {}", repr(instance), Value::Array(options.clone())));
            }
        }
        if let Some(expected) = schema.get("const") {
            if !json_eq(expected, instance) {
                push(out, at, format!("{} was expected", repr(expected)));
            }
        }
    }

    fn check_combinators(
        &self,
        schema: &Map<String, Value>,
        instance: &Value,
        scope: Scope<'_>,
        at: &mut Vec<Segment>,
        out: &mut Vec<Violation>,
    ) -> Evaluated {
        let mut seen = Evaluated::default();
        if let Some(Value::Array(all)) = schema.get("allOf") {
            for sub in all {
                seen.merge(self.walk(sub, instance, scope.deeper(), at, out));
            }
        }
        if let Some(Value::Array(any)) = schema.get("anyOf") {
            let passing: Vec<Evaluated> = any.iter().filter_map(|sub| self.attempt(sub, instance, scope)).collect();
            if passing.is_empty() {
                push(out, at, format!("{} is not valid under any of the given schemas", repr(instance)));
            }
            for evaluated in passing {
                seen.merge(evaluated);
            }
        }
        if let Some(Value::Array(one)) = schema.get("oneOf") {
            let mut passing: Vec<Evaluated> = one.iter().filter_map(|sub| self.attempt(sub, instance, scope)).collect();
            match passing.len() {
                0 => push(out, at, format!("{} is not valid under any of the given schemas", repr(instance))),
                1 => seen.merge(passing.remove(0)),
                _ => push(out, at, format!("{} is valid under more than one of the given schemas", repr(instance))),
            }
        }
        if let Some(not) = schema.get("not") {
            if self.attempt(not, instance, scope).is_some() {
                push(out, at, format!("{} should not be valid under {not}", repr(instance)));
            }
        }
        seen
    }

    /// `if`/`then`/`else`, plus the schemas that apply once a property is
    /// present (`dependentSchemas`, schema-valued `dependencies`).
    fn check_conditional(
        &self,
        schema: &Map<String, Value>,
        instance: &Value,
        scope: Scope<'_>,
        at: &mut Vec<Segment>,
        out: &mut Vec<Violation>,
    ) -> Evaluated {
        let mut seen = Evaluated::default();
        if let Some(condition) = schema.get("if") {
            match self.attempt(condition, instance, scope) {
                Some(matched) => {
                    seen.merge(matched);
                    if let Some(then) = schema.get("then") {
                        seen.merge(self.walk(then, instance, scope.deeper(), at, out));
                    }
                }
                None => {
                    if let Some(otherwise) = schema.get("else") {
                        seen.merge(self.walk(otherwise, instance, scope.deeper(), at, out));
                    }
                }
            }
        }

        let Value::Object(map) = instance else {
            return seen;
        };
        for keyword in ["dependentSchemas", "dependencies"] {
            let Some(dependents) = schema.get(keyword).and_then(Value::as_object) else {
                continue;
            };
            for (name, sub) in dependents {
                if sub.is_array() || !map.contains_key(name) {
                    continue;
                }
                seen.merge(self.walk(sub, instance, scope.deeper(), at, out));
            }
        }
        seen
    }

    /// Walk `schema` on the side; its evaluations if `instance` passes.
    fn attempt(&self, schema: &Value, instance: &Value, scope: Scope<'_>) -> Option<Evaluated> {
        let mut scratch = Vec::new();
        let seen = self.walk(schema, instance, scope.deeper(), &mut Vec::new(), &mut scratch);
        scratch.is_empty().then_some(seen)
    }

    fn check_object(
        &self,
        schema: &Map<String, Value>,
        map: &Map<String, Value>,
        scope: Scope<'_>,
        at: &mut Vec<Segment>,
        out: &mut Vec<Violation>,
    ) -> Evaluated {
        let mut seen = Evaluated::default();
        if let Some(Value::Array(required)) = schema.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(name) {
                    push(out, at, format!("'{name}' is a required property"));
                }
            }
        }
        for keyword in ["dependentRequired", "dependencies"] {
            let Some(dependents) = schema.get(keyword).and_then(Value::as_object) else {
                continue;
            };
            for (name, needs) in dependents {
                let Value::Array(needs) = needs else {
                    continue;
                };
                if !map.contains_key(name) {
                    continue;
                }
                for need in needs.iter().filter_map(Value::as_str) {
                    if !map.contains_key(need) {
                        push(out, at, format!("'{need}' is a dependency of '{name}'"));
                    }
                }
            }
        }
        if let Some(min) = schema.get("minProperties").and_then(Value::as_u64) {
            if (map.len() as u64) < min {
                push(out, at, format!("{} does not have enough properties", repr_object(map)));
            }
        }
        if let Some(max) = schema.get("maxProperties").and_then(Value::as_u64) {
            if (map.len() as u64) > max {
                push(out, at, format!("{} has too many properties", repr_object(map)));
            }
        }
        if let Some(names) = schema.get("propertyNames") {
            for key in map.keys() {
                self.walk(names, &Value::String(key.clone()), scope.deeper(), at, out);
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        let pattern_props = schema.get("patternProperties").and_then(Value::as_object);
        let additional = schema.get("additionalProperties");
        let mut unexpected = Vec::new();

        for (key, value) in map {
            let mut matched = false;
            if let Some(sub) = properties.and_then(|p| p.get(key)) {
                matched = true;
                at.push(Segment::Key(key.clone()));
                self.walk(sub, value, scope.deeper(), at, out);
                at.pop();
            }
            if let Some(patterns) = pattern_props {
                for (pattern, sub) in patterns {
                    if self.matches(pattern, key) {
                        matched = true;
                        at.push(Segment::Key(key.clone()));
                        self.walk(sub, value, scope.deeper(), at, out);
                        at.pop();
                    }
                }
            }
            if matched || additional.is_some() {
                seen.keys.insert(key.clone());
            }
            if matched {
                continue;
            }
            match additional {
                Some(Value::Bool(false)) => unexpected.push(key.as_str()),
                Some(sub @ Value::Object(_)) => {
                    at.push(Segment::Key(key.clone()));
                    self.walk(sub, value, scope.deeper(), at, out);
                    at.pop();
                }
                _ => {}
            }
        }

        if !unexpected.is_empty() {
            push(out, at, format!("Additional properties are not allowed ({})", unexpected_list(&unexpected)));
        }
        seen
    }

    fn check_unevaluated_properties(
        &self,
        schema: &Map<String, Value>,
        map: &Map<String, Value>,
        seen: &mut Evaluated,
        scope: Scope<'_>,
        at: &mut Vec<Segment>,
        out: &mut Vec<Violation>,
    ) {
        let Some(rule) = schema.get("unevaluatedProperties") else {
            return;
        };
        let mut unexpected = Vec::new();
        for (key, value) in map {
            if seen.keys.contains(key) {
                continue;
            }
            if *rule == Value::Bool(false) {
                unexpected.push(key.as_str());
            } else {
                at.push(Segment::Key(key.clone()));
                self.walk(rule, value, scope.deeper(), at, out);
                at.pop();
            }
        }
        if !unexpected.is_empty() {
            push(out, at, format!("Unevaluated properties are not allowed ({})", unexpected_list(&unexpected)));
        }
        seen.keys.extend(map.keys().cloned());
    }

    fn check_array(
        &self,
        schema: &Map<String, Value>,
        items: &[Value],
        scope: Scope<'_>,
        at: &mut Vec<Segment>,
        out: &mut Vec<Violation>,
    ) -> Evaluated {
        let mut seen = Evaluated::default();
        let shown = || repr(&Value::Array(items.to_vec()));
        if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
            if (items.len() as u64) < min {
                let msg = if min == 1 { "should be non-empty" } else { "is too short" };
                push(out, at, format!("{} {msg}", shown()));
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
            if (items.len() as u64) > max {
                push(out, at, format!("{} is too long", shown()));
            }
        }
        if schema.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
            let duplicated = items
                .iter()
                .enumerate()
                .any(|(i, a)| items[i + 1..].iter().any(|b| json_eq(a, b)));
            if duplicated {
                push(out, at, format!("{} has non-unique elements", shown()));
            }
        }

        if let Some(contains) = schema.get("contains") {
            let matching: Vec<usize> = items
                .iter()
                .enumerate()
                .filter(|(_, item)| self.attempt(contains, item, scope).is_some())
                .map(|(i, _)| i)
                .collect();
            let found = matching.len() as u64;
            let min = schema.get("minContains").and_then(Value::as_u64).unwrap_or(1);
            if found < min {
                let msg = if found == 0 {
                    format!("{} does not contain items matching the given schema", shown())
                } else {
                    format!("Too few items match the given schema (expected at least {min} but only {found} matched)")
                };
                push(out, at, msg);
            }
            if let Some(max) = schema.get("maxContains").and_then(Value::as_u64) {
                if found > max {
                    push(out, at, format!("Too many items match the given schema (expected at most {max})"));
                }
            }
            seen.items.extend(matching);
        }

        // Draft 2020-12 `prefixItems`; an array-valued `items` is the older
        // spelling, with `additionalItems` for the rest.
        let (prefix, rest): (&[Value], Option<&Value>) = match (schema.get("prefixItems"), schema.get("items")) {
            (Some(Value::Array(p)), rest) => (p.as_slice(), rest),
            (None, Some(Value::Array(p))) => (p.as_slice(), schema.get("additionalItems")),
            (_, rest) => (NO_ITEMS, rest),
        };
        for (i, item) in items.iter().enumerate() {
            let sub = match prefix.get(i) {
                Some(sub) => sub,
                None => match rest {
                    Some(sub) => sub,
                    None => continue,
                },
            };
            seen.items.insert(i);
            at.push(Segment::Index(i));
            self.walk(sub, item, scope.deeper(), at, out);
            at.pop();
        }
        seen
    }

    fn check_unevaluated_items(
        &self,
        schema: &Map<String, Value>,
        items: &[Value],
        seen: &mut Evaluated,
        scope: Scope<'_>,
        at: &mut Vec<Segment>,
        out: &mut Vec<Violation>,
    ) {
        let Some(rule) = schema.get("unevaluatedItems") else {
            return;
        };
        let mut unexpected = Vec::new();
        for (i, item) in items.iter().enumerate() {
            if seen.items.contains(&i) {
                continue;
            }
            if *rule == Value::Bool(false) {
                unexpected.push(repr(item));
            } else {
                at.push(Segment::Index(i));
                self.walk(rule, item, scope.deeper(), at, out);
                at.pop();
            }
        }
        if !unexpected.is_empty() {
            let verb = if unexpected.len() == 1 { "was" } else { "were" };
            push(out, at, format!("Unevaluated items are not allowed ({} {verb} unexpected)", unexpected.join(", ")));
        }
        seen.items.extend(0..items.len());
    }

    fn check_string(&self, schema: &Map<String, Value>, s: &str, at: &[Segment], out: &mut Vec<Violation>) {
        let len = s.chars().count() as u64;
        if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
            if len < min {
                let msg = if min == 1 { "should be non-empty" } else { "is too short" };
                push(out, at, format!("'{s}' {msg}"));
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
            if len > max {
                push(out, at, format!("'{s}' is too long"));
            }
        }
        if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
            if !self.matches(pattern, s) {
                push(out, at, format!("'{s}' does not match '{pattern}'"));
            }
        }
        if self.assert_format {
            if let Some(format) = schema.get("format").and_then(Value::as_str) {
                let ok = match format {
                    "date-time" => is_date_time(s),
                    "date" => is_date(s),
                    _ => true,
                };
                if !ok {
                    push(out, at, format!("'{s}' is not a '{format}'"));
                }
            }
        }
    }

    /// `re.search` semantics: unanchored. Every pattern was compiled by
    /// [`Validator::new`].
    fn matches(&self, pattern: &str, text: &str) -> bool {
        self.patterns.get(pattern).is_some_and(|re| re.is_match(text))
    }
}

fn check_number(schema: &Map<String, Value>, instance: &Value, at: &[Segment], out: &mut Vec<Violation>) {
    let Some(n) = instance.as_f64() else {
        return;
    };
    let bound = |key: &str| schema.get(key).and_then(Value::as_f64);
    if let Some(min) = bound("minimum") {
        if n < min {
            push(out, at, format!("{instance} is less than the minimum of {}", schema["minimum"]));
        }
    }
    if let Some(max) = bound("maximum") {
        if n > max {
            push(out, at, format!("{instance} is greater than the maximum of {}", schema["maximum"]));
        }
    }
    if let Some(min) = bound("exclusiveMinimum") {
        if n <= min {
            push(out, at, format!("{instance} is less than or equal to the minimum of {}", schema["exclusiveMinimum"]));
        }
    }
    if let Some(max) = bound("exclusiveMaximum") {
        if n >= max {
            push(out, at, format!("{instance} is greater than or equal to the maximum of {}", schema["exclusiveMaximum"]));
        }
    }
    if let Some(step) = schema.get("multipleOf").filter(|s| s.as_f64().is_some_and(|s| s > 0.0)) {
        if !is_multiple(instance, step) {
            push(out, at, format!("{instance} is not a multiple of {step}"));
        }
    }
}

/// Exact for integers; floats allow for binary rounding (`0.3` is a multiple
/// of `0.1`).
fn is_multiple(value: &Value, step: &Value) -> bool {
    if let (Some(a), Some(b)) = (value.as_i64(), step.as_i64()) {
        return a % b == 0;
    }
    let (Some(a), Some(b)) = (value.as_f64(), step.as_f64()) else {
        return true;
    };
    let quotient = a / b;
    quotient.is_finite() && (quotient - quotient.round()).abs() <= 1e-9 * quotient.abs().max(1.0)
}

fn push(out: &mut Vec<Violation>, at: &[Segment], message: String) {
    out.push(Violation {
        at: at.to_vec(),
        message,
    });
}

fn unexpected_list(keys: &[&str]) -> String {
    let listed = keys.iter().map(|k| format!("'{k}'")).collect::<Vec<_>>().join(", ");
    let verb = if keys.len() == 1 { "was" } else { "were" };
    format!("{listed} {verb} unexpected")
}

/// Resolve `reference` against the URI `base`. Fragments are stripped.
fn join_uri(base: &str, reference: &str) -> String {
    let reference = reference.split('#').next().unwrap_or_default();
    if base.is_empty() || reference.contains("://") || reference.starts_with("urn:") {
        return reference.to_string();
    }
    if reference.is_empty() {
        return base.to_string();
    }
    let base = base.split('#').next().unwrap_or_default();
    let authority = base.find("://").map_or(0, |i| i + 3);
    let origin_end = base[authority..].find('/').map_or(base.len(), |i| authority + i);
    if let Some(path) = reference.strip_prefix('/') {
        return format!("{}/{path}", &base[..origin_end]);
    }
    match base.rfind('/') {
        Some(i) if i >= origin_end => format!("{}{reference}", &base[..=i]),
        _ if authority > 0 => format!("{base}/{reference}"),
        _ => reference.to_string(),
    }
}

fn render_path(at: &[Segment]) -> String {
    if at.is_empty() {
        return ROOT.to_string();
    }
    at.iter()
        .map(|s| match s {
            Segment::Index(i) => i.to_string(),
            Segment::Key(k) => k.clone(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn is_type(instance: &Value, name: &str) -> bool {
    match name {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "number" => instance.is_number(),
        "integer" => match instance {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
            _ => false,
        },
        _ => true,
    }
}

/// JSON equality where `1` and `1.0` are the same number.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| json_eq(v, w)))
        }
        _ => a == b,
    }
}

fn repr(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

fn repr_object(map: &Map<String, Value>) -> String {
    Value::Object(map.clone()).to_string()
}

fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Validate `instance` as an object of `object_type`.
///
/// Returns every field error; an empty list means the object is valid. Only
/// schema resolution faults are returned as `Err`.
///
/// With `skip_signature` a missing or blank signature is replaced by
/// [`PLACEHOLDER_SIGNATURE`] before checking, and no signature error is
/// raised. Without it, a missing signature is an error on `signature`, and an
/// installed `verifier` gets the final say on a present one.
pub fn validate_object(
    registry: &SchemaRegistry,
    object_type: ObjectType,
    instance: &Value,
    skip_signature: bool,
    verifier: Option<&dyn SignatureVerifier>,
) -> SchemaResult<Vec<FieldError>> {
    let schema = registry.resolve(object_type)?;
    if !instance.is_object() {
        return Ok(vec![FieldError::root("object must be a JSON object")]);
    }

    let patched;
    let candidate = if skip_signature && signature_of(instance).is_none() {
        let mut copy = instance.clone();
        if let Value::Object(map) = &mut copy {
            map.insert(SIGNATURE_FIELD.into(), Value::String(PLACEHOLDER_SIGNATURE.into()));
        }
        patched = copy;
        &patched
    } else {
        instance
    };

    let mut errors = Validator::new(&schema)?.validate(candidate);

    if !skip_signature {
        match signature_of(instance) {
            None => errors.push(FieldError::new(SIGNATURE_FIELD, "must be a non-empty string")),
            Some(_) => {
                if let Some(verifier) = verifier {
                    if let SignatureCheck::Rejected { reason } = verifier.verify(object_type, instance) {
                        debug!(object_type = %object_type, verifier = verifier.name(), "signature rejected");
                        errors.push(FieldError::new(SIGNATURE_FIELD, reason));
                    }
                }
            }
        }
    }

    debug!(object_type = %object_type, errors = errors.len(), "validated");
    Ok(errors)
}
