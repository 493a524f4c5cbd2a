use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};

// Placeholder name -> replacement value, iterated in key order.
// Keys may be written bare (`fnames`) or as they appear in the template (`$fnames`).
pub type OptionMap = BTreeMap<String, String>;

// A command template parsed once into argument words.
// Substitution walks the parsed segments a single time, so replacement values are never rescanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
    words: Vec<Vec<Segment>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, braced: bool },
}

impl CommandTemplate {
    // Split the template with shell word rules, then locate `$name` / `${name}` inside each word.
    pub fn parse(source: &str) -> Result<Self> {
        let words = shell_words::split(source)
            .with_context(|| format!("parsing command template failed: {source}"))?;
        Ok(Self {
            source: source.to_string(),
            words: words.iter().map(|word| parse_word(word)).collect(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    // Every placeholder name referenced by the template.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.words
            .iter()
            .flatten()
            .filter_map(|segment| match segment {
                Segment::Placeholder { name, .. } => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    // Placeholders that `options` does not cover; these render verbatim.
    pub fn unresolved<'a>(&'a self, options: &OptionMap) -> Vec<&'a str> {
        self.placeholders()
            .into_iter()
            .filter(|name| lookup(options, name).is_none())
            .collect()
    }

    // Produce the final argument list. Unknown placeholders are emitted exactly as written.
    pub fn render(&self, options: &OptionMap) -> Vec<String> {
        self.words
            .iter()
            .map(|segments| {
                let mut arg = String::new();
                for segment in segments {
                    match segment {
                        Segment::Literal(text) => arg.push_str(text),
                        Segment::Placeholder { name, braced } => match lookup(options, name) {
                            Some(value) => arg.push_str(value),
                            None if *braced => {
                                arg.push_str("${");
                                arg.push_str(name);
                                arg.push('}');
                            }
                            None => {
                                arg.push('$');
                                arg.push_str(name);
                            }
                        },
                    }
                }
                arg
            })
            .collect()
    }
}

// Option key with any leading `$` removed, i.e. the bare placeholder name.
pub fn placeholder_key(key: &str) -> &str {
    key.trim_start_matches('$')
}

// Resolve a placeholder, accepting `$`-prefixed keys. A bare key wins when both forms are present.
fn lookup<'a>(options: &'a OptionMap, name: &str) -> Option<&'a String> {
    options.get(name).or_else(|| {
        options
            .iter()
            .find(|(key, _)| key.starts_with('$') && placeholder_key(key) == name)
            .map(|(_, value)| value)
    })
}

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn is_name(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(is_name_byte)
}

// Scan one word for placeholders. `$$` yields a literal `$`; a `$` without a name stays literal.
fn parse_word(word: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = word;

    while let Some(pos) = rest.find('$') {
        literal.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            literal.push('$');
            rest = tail;
            continue;
        }

        if let Some(inner) = after.strip_prefix('{')
            && let Some(end) = inner.find('}')
            && is_name(&inner[..end])
        {
            flush_literal(&mut literal, &mut segments);
            segments.push(Segment::Placeholder {
                name: inner[..end].to_string(),
                braced: true,
            });
            rest = &inner[end + 1..];
            continue;
        }

        let len = after.bytes().take_while(|b| is_name_byte(*b)).count();
        if len == 0 {
            literal.push('$');
            rest = after;
            continue;
        }

        flush_literal(&mut literal, &mut segments);
        segments.push(Segment::Placeholder {
            name: after[..len].to_string(),
            braced: false,
        });
        rest = &after[len..];
    }

    literal.push_str(rest);
    flush_literal(&mut literal, &mut segments);
    segments
}

fn flush_literal(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> OptionMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_every_occurrence() {
        let template = CommandTemplate::parse("-a $x -b $x/$y.log").unwrap();
        let args = template.render(&options(&[("x", "one"), ("y", "two")]));
        assert_eq!(args, vec!["-a", "one", "-b", "one/two.log"]);
    }

    #[test]
    fn unknown_placeholders_pass_through_verbatim() {
        let template = CommandTemplate::parse("-f $known -g $missing ${braced}x").unwrap();
        let args = template.render(&options(&[("known", "k")]));
        assert_eq!(args, vec!["-f", "k", "-g", "$missing", "${braced}x"]);
        assert_eq!(
            template.unresolved(&options(&[("known", "k")])),
            vec!["braced", "missing"]
        );
    }

    #[test]
    fn replacement_values_are_not_rescanned() {
        // With repeated whole-string replacement the result depended on key order.
        let template = CommandTemplate::parse("-in $a -out $b").unwrap();
        let args = template.render(&options(&[("a", "$b"), ("b", "$a")]));
        assert_eq!(args, vec!["-in", "$b", "-out", "$a"]);
    }

    #[test]
    fn dollar_prefixed_keys_resolve_like_bare_keys() {
        let template = CommandTemplate::parse("-fnames $fnames -ofname ${ofname}").unwrap();
        let opts = options(&[("$fnames", "a.log"), ("$ofname", "out.csv"), ("ofname", "bare.csv")]);
        assert_eq!(
            template.render(&opts),
            vec!["-fnames", "a.log", "-ofname", "bare.csv"]
        );
        assert!(template.unresolved(&opts).is_empty());
    }

    #[test]
    fn names_match_greedily() {
        let template = CommandTemplate::parse("$file $file_name").unwrap();
        let args = template.render(&options(&[("file", "F"), ("file_name", "FN")]));
        assert_eq!(args, vec!["F", "FN"]);
    }

    #[test]
    fn braces_delimit_names_inside_words() {
        let template = CommandTemplate::parse("${base}_suffix").unwrap();
        let args = template.render(&options(&[("base", "log")]));
        assert_eq!(args, vec!["log_suffix"]);
    }

    #[test]
    fn dollar_without_name_is_literal() {
        let template = CommandTemplate::parse("cost$ $$x ${not closed").unwrap();
        assert!(template.placeholders().is_empty());
        let args = template.render(&options(&[("x", "nope")]));
        assert_eq!(args, vec!["cost$", "$x", "${not", "closed"]);
    }

    #[test]
    fn quoted_words_keep_values_as_one_argument() {
        let template = CommandTemplate::parse("-title '$name report'").unwrap();
        let args = template.render(&options(&[("name", "a b; rm -rf /")]));
        assert_eq!(args, vec!["-title", "a b; rm -rf / report"]);
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let err = CommandTemplate::parse("-fnames 'oops").unwrap_err();
        assert!(format!("{err:#}").contains("parsing command template failed"));
    }

    #[test]
    fn placeholders_lists_unique_names() {
        let template = CommandTemplate::parse("$b $a ${b} plain").unwrap();
        assert_eq!(
            template.placeholders().into_iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }
}
