use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde_yaml::{Mapping, Value};

use corpus_frontmatter::header::{self, Header};

/// One heading-delimited region of a paper body (spec §3 `paper_structure`).
#[derive(Debug, Clone)]
pub struct Section {
    pub section_type: String,
    pub title: String,
    pub start_line: usize,
    pub end_line: usize,
    pub word_count: usize,
    pub subsections: Vec<Section>,
}

struct Heading {
    level: HeadingLevel,
    title: String,
    start_line: usize,
}

fn line_of(body: &str, byte_offset: usize) -> usize {
    body[..byte_offset.min(body.len())].matches('\n').count() + 1
}

fn collect_headings(body: &str) -> Vec<Heading> {
    let parser = Parser::new_ext(body, Options::empty()).into_offset_iter();
    let mut headings = Vec::new();
    let mut current: Option<(HeadingLevel, usize, String)> = None;

    for (event, range) in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((level, range.start, String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, title)) = &mut current {
                    title.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, start, title)) = current.take() {
                    headings.push(Heading {
                        level,
                        title: title.trim().to_string(),
                        start_line: line_of(body, start),
                    });
                }
            }
            _ => {}
        }
    }
    headings
}

fn word_count(body: &str, start_line: usize, end_line: usize) -> usize {
    body.lines()
        .skip(start_line)
        .take(end_line.saturating_sub(start_line))
        .flat_map(str::split_whitespace)
        .count()
}

/// Classify a heading title into one of the well-known academic-paper
/// section kinds, falling back to `other` (spec §3 `section_types_found`).
fn classify(title: &str) -> String {
    let lower = title.to_lowercase();
    let pairs: &[(&str, &str)] = &[
        ("abstract", "abstract"),
        ("introduction", "introduction"),
        ("background", "background"),
        ("related work", "related_work"),
        ("method", "methodology"),
        ("material", "methodology"),
        ("experiment", "methodology"),
        ("result", "results"),
        ("evaluation", "results"),
        ("discussion", "discussion"),
        ("conclusion", "conclusion"),
        ("limitation", "discussion"),
        ("acknowledg", "acknowledgments"),
        ("reference", "references"),
        ("bibliograph", "references"),
        ("appendix", "appendix"),
    ];
    for (needle, kind) in pairs {
        if lower.contains(needle) {
            return (*kind).to_string();
        }
    }
    "other".to_string()
}

/// Parse the body of a paper into nested `Section`s (spec §3
/// `paper_structure`). Top-level headings (`#`/`##`) become sections;
/// deeper headings nest as `subsections` of the nearest shallower one.
/// Line numbers are 1-based into the body, matching the front-matter
/// contract (post front-matter, first body line is line 1).
pub fn parse_sections(body: &str) -> Vec<Section> {
    let headings = collect_headings(body);
    if headings.is_empty() {
        return Vec::new();
    }
    let total_lines = body.lines().count().max(1);
    let top_level = headings.iter().map(|h| h.level).min().unwrap();

    let mut sections: Vec<Section> = Vec::new();
    let mut i = 0;
    while i < headings.len() {
        let h = &headings[i];
        if h.level != top_level {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < headings.len() && headings[j].level != top_level {
            j += 1;
        }
        let end_line = headings.get(j).map(|h| h.start_line).unwrap_or(total_lines + 1);
        let subsections = build_subsections(&headings[i + 1..j], end_line, body);

        sections.push(Section {
            section_type: classify(&h.title),
            title: h.title.clone(),
            start_line: h.start_line,
            end_line,
            word_count: word_count(body, h.start_line, end_line),
            subsections,
        });
        i = j;
    }
    sections
}

fn build_subsections(headings: &[Heading], parent_end_line: usize, body: &str) -> Vec<Section> {
    if headings.is_empty() {
        return Vec::new();
    }
    let sub_level = headings.iter().map(|h| h.level).min().unwrap();

    let mut out = Vec::new();
    let mut i = 0;
    while i < headings.len() {
        let h = &headings[i];
        if h.level != sub_level {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < headings.len() && headings[j].level != sub_level {
            j += 1;
        }
        let end_line = headings.get(j).map(|h| h.start_line).unwrap_or(parent_end_line);
        out.push(Section {
            section_type: classify(&h.title),
            title: h.title.clone(),
            start_line: h.start_line,
            end_line,
            word_count: word_count(body, h.start_line, end_line),
            subsections: Vec::new(),
        });
        i = j;
    }
    out
}

fn section_to_yaml(section: &Section) -> Value {
    let mut m = Mapping::new();
    m.insert(Value::String("section_type".into()), Value::String(section.section_type.clone()));
    m.insert(Value::String("title".into()), Value::String(section.title.clone()));
    m.insert(Value::String("start_line".into()), Value::Number((section.start_line as u64).into()));
    m.insert(Value::String("end_line".into()), Value::Number((section.end_line as u64).into()));
    m.insert(Value::String("word_count".into()), Value::Number((section.word_count as u64).into()));
    if !section.subsections.is_empty() {
        let subs: Vec<Value> = section.subsections.iter().map(section_to_yaml).collect();
        m.insert(Value::String("subsections".into()), Value::Sequence(subs));
    }
    Value::Mapping(m)
}

/// Write the `paper_structure` front-matter section and advance
/// `processing_status.section_parsing` (spec §3, §4.7 sequence).
pub fn update_header(header: &mut Header, sections: &[Section], now: &str) {
    let mut types_found: Vec<String> = sections.iter().map(|s| s.section_type.clone()).collect();
    types_found.sort();
    types_found.dedup();

    let mut m = Mapping::new();
    m.insert(Value::String("parsed_at".into()), Value::String(now.to_string()));
    m.insert(Value::String("total_sections".into()), Value::Number((sections.len() as u64).into()));
    m.insert(
        Value::String("section_types_found".into()),
        Value::Sequence(types_found.into_iter().map(Value::String).collect()),
    );
    m.insert(
        Value::String("sections".into()),
        Value::Sequence(sections.iter().map(section_to_yaml).collect()),
    );

    header::set(header, "paper_structure", Value::Mapping(m));
    header::set_status(header, "section_parsing", "completed");
    header::set_str(header, "last_updated", now.to_string());
}
