//! Sample metadata: fixed fields, custom values, tags and rewrite rules.

mod fields;
mod rewrite;
mod template;
mod types;
mod validate;

pub use fields::{CoerceError, FieldKind, FieldValue, FixedField};
pub use rewrite::{
    auto_category, default_rules, RewriteError, RewriteRule, AUTO_CATEGORY_KEY, DEFAULT_RULES,
    DEFAULT_RULE_SET,
};
pub use template::{render as render_template, TemplateError};
pub use types::{Metadata, MetadataError, TAGS_KEY};
pub use validate::{
    expand_tags, is_valid_custom_key, is_valid_tag, leaf_tags, parent_tags, sanitize_tag_path,
};
