//! Record → markdown rendering.
//!
//! Every synced record becomes one markdown document. The exact line
//! format is consumed by the downstream memory indexer, so headings,
//! bold labels and the full-width colon (`：`) must stay byte-for-byte stable:
//!
//! ```text
//! ## [2024-05-17] Title
//! - **来源**：Primary Table | **素材来源**：... | **评级**：...
//! - **飞书记录**：recXXXX
//!
//! **核心观点**：...
//!
//! **搜索关键词**：Title, tag-a, tag-b
//! ```
//!
//! Two renderer variants exist:
//!
//! | Variant | Used for |
//! |---------|----------|
//! | [`RendererKind::Schema`] | Tables with a known column layout ([`MATERIAL`], [`KNOWLEDGE`]) |
//! | [`RendererKind::Generic`] | Any other table; title and date are discovered heuristically |
//!
//! Which variant a table uses is decided once, when the
//! [`RendererRegistry`] is built from configuration.

use anyhow::{bail, Result};
use std::collections::HashMap;

use crate::config::Config;
use crate::fields::{opt_text, to_text, BoolStyle, DateResolver, FieldValue};
use crate::models::RemoteRecord;

/// One `**label**：value` cell on a metadata line.
#[derive(Debug)]
pub enum MetaCell {
    /// Value taken from a record field.
    Field {
        label: &'static str,
        field: &'static str,
    },
    /// Fixed value.
    Literal {
        label: &'static str,
        value: &'static str,
    },
}

/// A labelled free-text block, emitted only when the field is non-empty.
#[derive(Debug)]
pub struct Section {
    pub field: &'static str,
    pub label: &'static str,
}

/// Column layout for a schema-bound table.
#[derive(Debug)]
pub struct SchemaLayout {
    pub name: &'static str,
    pub title_field: &'static str,
    /// Rendered when the title column is missing entirely.
    pub missing_title: &'static str,
    /// Whether [`missing_title`](Self::missing_title) also feeds the keyword line.
    pub missing_title_is_keyword: bool,
    pub date_field: &'static str,
    /// Metadata lines between the heading and the record id line.
    pub meta_lines: &'static [&'static [MetaCell]],
    pub sections: &'static [Section],
    /// List-valued columns whose entries become search keywords.
    pub keyword_fields: &'static [&'static str],
    /// How checkbox cells are rendered.
    pub bools: BoolStyle,
}

/// Content material table: sources, ratings and quotable takeaways.
pub const MATERIAL: SchemaLayout = SchemaLayout {
    name: "material",
    title_field: "标题",
    missing_title: "无标题",
    missing_title_is_keyword: true,
    date_field: "日期",
    meta_lines: &[
        &[
            MetaCell::Literal {
                label: "来源",
                value: "Primary Table",
            },
            MetaCell::Field {
                label: "素材来源",
                field: "素材来源",
            },
            MetaCell::Field {
                label: "评级",
                field: "素材评级",
            },
        ],
        &[
            MetaCell::Field {
                label: "内容标签",
                field: "内容标签",
            },
            MetaCell::Field {
                label: "情绪标签",
                field: "情绪标签",
            },
        ],
        &[MetaCell::Field {
            label: "目标人群",
            field: "目标人群",
        }],
    ],
    sections: &[
        Section {
            field: "核心观点",
            label: "核心观点",
        },
        Section {
            field: "金句摘录",
            label: "金句摘录",
        },
        Section {
            field: "适合选题方向",
            label: "适合选题方向",
        },
    ],
    keyword_fields: &["内容标签", "情绪标签", "目标人群"],
    bools: BoolStyle::YesNo,
};

/// Personal knowledge table: insights, reflections and action items.
pub const KNOWLEDGE: SchemaLayout = SchemaLayout {
    name: "knowledge",
    title_field: "标题",
    missing_title: "无标题",
    missing_title_is_keyword: false,
    date_field: "日期",
    meta_lines: &[
        &[
            MetaCell::Field {
                label: "类型",
                field: "内容类型",
            },
            MetaCell::Field {
                label: "来源",
                field: "来源平台",
            },
            MetaCell::Field {
                label: "评级",
                field: "公众号素材评级",
            },
        ],
        &[MetaCell::Field {
            label: "标签",
            field: "标签",
        }],
    ],
    sections: &[
        Section {
            field: "核心洞察",
            label: "核心洞察",
        },
        Section {
            field: "我的思考",
            label: "个人思考",
        },
        Section {
            field: "行动项",
            label: "行动项",
        },
    ],
    keyword_fields: &["标签", "关联技术栈"],
    bools: BoolStyle::Plain,
};

const SCHEMAS: &[&SchemaLayout] = &[&MATERIAL, &KNOWLEDGE];

const GENERIC_TITLE_KEYS: &[&str] = &["标题", "名称", "案例标题", "内容标题"];
const GENERIC_DATE_KEYS: &[&str] = &["日期", "创建时间", "时间"];
const GENERIC_SKIP_KEYS: &[&str] = &["标题", "名称", "日期", "创建时间"];
const GENERIC_KEYWORD_KEYS: &[&str] = &["标签", "内容标签", "关键词"];
const GENERIC_MAX_TITLE_CHARS: usize = 100;
const GENERIC_MAX_VALUE_CHARS: usize = 500;
const UNTITLED: &str = "Untitled";

const RECORD_LABEL: &str = "飞书记录";
const KEYWORDS_LABEL: &str = "搜索关键词";

/// Renderer variant for a table.
#[derive(Debug, Clone, Copy)]
pub enum RendererKind {
    Schema(&'static SchemaLayout),
    Generic,
}

impl RendererKind {
    /// Look up a renderer by its configuration tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        if tag == "generic" {
            return Some(RendererKind::Generic);
        }
        SCHEMAS
            .iter()
            .find(|s| s.name == tag)
            .map(|s| RendererKind::Schema(*s))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            RendererKind::Schema(layout) => layout.name,
            RendererKind::Generic => "generic",
        }
    }

    /// Render one record. Pure apart from the resolver's notion of today.
    pub fn render(&self, record: &RemoteRecord, table_name: &str, dates: &DateResolver) -> String {
        match self {
            RendererKind::Schema(layout) => render_schema(layout, record, dates),
            RendererKind::Generic => render_generic(record, table_name, dates),
        }
    }

    /// Best-effort title used in progress output.
    pub fn title_hint(&self, record: &RemoteRecord) -> String {
        let keys: &[&str] = match self {
            RendererKind::Schema(layout) => std::slice::from_ref(&layout.title_field),
            RendererKind::Generic => GENERIC_TITLE_KEYS,
        };
        keys.iter()
            .filter_map(|k| record.field(k))
            .find(FieldValue::is_truthy)
            .map(|v| to_text(&v, BoolStyle::Plain))
            .unwrap_or_else(|| "?".to_string())
    }
}

/// Renderer selection for every configured table, keyed by table id.
#[derive(Debug, Clone, Default)]
pub struct RendererRegistry {
    by_table: HashMap<String, RendererKind>,
}

impl RendererRegistry {
    /// Resolve each table's renderer.
    ///
    /// An explicit `schema` tag wins; otherwise the table named by
    /// `sync.primary_table` gets [`MATERIAL`] and all others are generic.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut by_table = HashMap::new();
        for table in &config.tables {
            let kind = match &table.schema {
                Some(tag) => match RendererKind::from_tag(tag) {
                    Some(kind) => kind,
                    None => bail!(
                        "Unknown schema '{}' for table '{}'. Must be material, knowledge, or generic.",
                        tag,
                        table.id
                    ),
                },
                None if config.sync.primary_table.as_deref() == Some(table.name.as_str()) => {
                    RendererKind::Schema(&MATERIAL)
                }
                None => RendererKind::Generic,
            };
            by_table.insert(table.id.clone(), kind);
        }
        Ok(Self { by_table })
    }

    pub fn insert(&mut self, table_id: impl Into<String>, kind: RendererKind) {
        self.by_table.insert(table_id.into(), kind);
    }

    /// Renderer for a table id; unknown tables fall back to generic.
    pub fn get(&self, table_id: &str) -> RendererKind {
        self.by_table
            .get(table_id)
            .copied()
            .unwrap_or(RendererKind::Generic)
    }
}

fn render_schema(layout: &SchemaLayout, record: &RemoteRecord, dates: &DateResolver) -> String {
    let text = |field: &str| opt_text(record.field(field).as_ref(), layout.bools);

    let title_value = record.field(layout.title_field);
    let title = match &title_value {
        Some(v) => to_text(v, layout.bools),
        None => layout.missing_title.to_string(),
    };
    let date = dates.to_date(record.field(layout.date_field).as_ref());

    let mut lines = vec![format!("## [{}] {}", date, title)];
    for cells in layout.meta_lines {
        let rendered: Vec<String> = cells
            .iter()
            .map(|cell| match cell {
                MetaCell::Field { label, field } => format!("**{}**：{}", label, text(field)),
                MetaCell::Literal { label, value } => format!("**{}**：{}", label, value),
            })
            .collect();
        lines.push(format!("- {}", rendered.join(" | ")));
    }
    lines.push(format!("- **{}**：{}", RECORD_LABEL, record.record_id));
    lines.push(String::new());

    for section in layout.sections {
        let body = text(section.field);
        if !body.is_empty() {
            lines.push(format!("**{}**：{}", section.label, body));
            lines.push(String::new());
        }
    }

    let mut keywords = Keywords::default();
    if title_value.is_some() || layout.missing_title_is_keyword {
        keywords.add(&title);
    }
    for field in layout.keyword_fields {
        keywords.add_list(record.field(field).as_ref());
    }
    if !keywords.is_empty() {
        lines.push(format!("**{}**：{}", KEYWORDS_LABEL, keywords.join()));
        lines.push(String::new());
    }

    lines.join("\n")
}

fn render_generic(record: &RemoteRecord, table_name: &str, dates: &DateResolver) -> String {
    let title = generic_title(record);

    let date = GENERIC_DATE_KEYS
        .iter()
        .filter_map(|k| record.field(k))
        .find(FieldValue::is_truthy)
        .map(|v| dates.to_date(Some(&v)))
        .unwrap_or_else(|| dates.today());

    let mut lines = vec![
        format!("## [{}] {}", date, title),
        format!("- **来源**：{}", table_name),
        format!("- **{}**：{}", RECORD_LABEL, record.record_id),
        String::new(),
    ];

    for (name, value) in record.iter_fields() {
        if GENERIC_SKIP_KEYS.contains(&name) {
            continue;
        }
        let text = to_text(&value, BoolStyle::Plain);
        if !text.is_empty() {
            let clipped: String = text.chars().take(GENERIC_MAX_VALUE_CHARS).collect();
            lines.push(format!("**{}**：{}", name, clipped));
            lines.push(String::new());
        }
    }

    let mut keywords = Keywords::default();
    keywords.add(&title);
    for key in GENERIC_KEYWORD_KEYS {
        keywords.add_list(record.field(key).as_ref());
    }
    lines.push(format!("**{}**：{}", KEYWORDS_LABEL, keywords.join()));
    lines.push(String::new());

    lines.join("\n")
}

/// Title discovery for tables without a known layout.
///
/// The first set title-like column wins; failing that, the first column
/// whose text is short enough to read as a title; failing that, `Untitled`.
fn generic_title(record: &RemoteRecord) -> String {
    let named = GENERIC_TITLE_KEYS
        .iter()
        .filter_map(|k| record.field(k))
        .find(FieldValue::is_truthy)
        .map(|v| to_text(&v, BoolStyle::Plain))
        .unwrap_or_default();
    if !named.is_empty() {
        return named;
    }

    record
        .iter_fields()
        .map(|(_, v)| to_text(&v, BoolStyle::Plain))
        .find(|t| !t.is_empty() && t.chars().count() < GENERIC_MAX_TITLE_CHARS)
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Insertion-ordered, de-duplicated keyword list.
#[derive(Default)]
struct Keywords(Vec<String>);

impl Keywords {
    fn add(&mut self, keyword: &str) {
        if !keyword.is_empty() && !self.0.iter().any(|k| k == keyword) {
            self.0.push(keyword.to_string());
        }
    }

    fn add_list(&mut self, value: Option<&FieldValue>) {
        if let Some(value) = value {
            for item in value.list_items() {
                self.add(&item.to_string());
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn join(&self) -> String {
        self.0.join(", ")
    }
}
