//! IRI constants for the hook definition vocabulary (see `gh:` usage in
//! `hooks/**/*.ttl`).
//!
//! `gh:Hook` resources carry `dct:title`, `gh:hasPredicate` (a predicate
//! resource typed with one of the four `gh:*Predicate` classes) and
//! `gh:orderedPipelines` (an `rdf:List` of workflow resources). Workflow
//! resources carry `gh:orderedSteps` (an `rdf:List` of step resources).
//! A step resource carries `gh:stepId`, `gh:stepKind`, an optional
//! `gh:configJson` (a JSON object literal holding the kind-specific
//! config fields — Turtle has no convenient way to express an arbitrary
//! nested config shape per kind, so it is carried as one literal rather
//! than one predicate per field), zero or more `gh:dependsOn` string
//! literals (each naming another step's `gh:stepId` within the same
//! workflow), and an optional `gh:timeoutMs` integer literal.

pub const GH: &str = "http://gitvan.dev/ns/hooks#";
pub const DCT: &str = "http://purl.org/dc/terms/";
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

pub const HOOK_CLASS: &str = "http://gitvan.dev/ns/hooks#Hook";
pub const TITLE: &str = "http://purl.org/dc/terms/title";
pub const HAS_PREDICATE: &str = "http://gitvan.dev/ns/hooks#hasPredicate";
pub const ORDERED_PIPELINES: &str = "http://gitvan.dev/ns/hooks#orderedPipelines";
pub const ORDERED_STEPS: &str = "http://gitvan.dev/ns/hooks#orderedSteps";

pub const PREDICATE_RESULT_DELTA: &str = "http://gitvan.dev/ns/hooks#ResultDeltaPredicate";
pub const PREDICATE_ASK: &str = "http://gitvan.dev/ns/hooks#AskPredicate";
pub const PREDICATE_SELECT_THRESHOLD: &str = "http://gitvan.dev/ns/hooks#SelectThresholdPredicate";
pub const PREDICATE_SHACL_ALL_CONFORM: &str = "http://gitvan.dev/ns/hooks#ShaclAllConformPredicate";

pub const QUERY_TEXT: &str = "http://gitvan.dev/ns/hooks#queryText";
pub const THRESHOLD: &str = "http://gitvan.dev/ns/hooks#threshold";
pub const OPERATOR: &str = "http://gitvan.dev/ns/hooks#operator";
pub const SHAPES_TEXT: &str = "http://gitvan.dev/ns/hooks#shapesText";

pub const STEP_ID: &str = "http://gitvan.dev/ns/hooks#stepId";
pub const STEP_KIND: &str = "http://gitvan.dev/ns/hooks#stepKind";
pub const CONFIG_JSON: &str = "http://gitvan.dev/ns/hooks#configJson";
pub const DEPENDS_ON: &str = "http://gitvan.dev/ns/hooks#dependsOn";
pub const TIMEOUT_MS: &str = "http://gitvan.dev/ns/hooks#timeoutMs";

pub const PREFIXES: &str = r#"
PREFIX gh: <http://gitvan.dev/ns/hooks#>
PREFIX dct: <http://purl.org/dc/terms/>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
"#;
