//! Parser for `jx get previews` output.
//!
//! Grammar: a header line whose first column is `PULL REQUEST`, then one row
//! per preview environment: pull-request URL, namespace, application URL.
//! The application URL may be absent while the preview is still deploying.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{ParseError, rows_after_header};

/// One preview environment, keyed by pull-request URL in the returned map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub namespace: String,
    pub url: String,
}

/// Parse the previews table into a map keyed by pull-request URL.
pub fn parse_previews(output: &str) -> Result<HashMap<String, Preview>, ParseError> {
    let rows =
        rows_after_header(output, "PULL REQUEST").ok_or_else(|| ParseError::MissingHeader {
            header: "PULL REQUEST",
            output: output.to_string(),
        })?;

    let mut previews = HashMap::new();
    for line in rows {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [pull_request, namespace, url] => {
                previews.insert(
                    (*pull_request).to_string(),
                    Preview {
                        namespace: (*namespace).to_string(),
                        url: (*url).to_string(),
                    },
                );
            }
            [pull_request, namespace] => {
                previews.insert(
                    (*pull_request).to_string(),
                    Preview {
                        namespace: (*namespace).to_string(),
                        url: String::new(),
                    },
                );
            }
            _ => {
                return Err(ParseError::MalformedRow {
                    context: "preview",
                    line: line.to_string(),
                });
            }
        }
    }

    Ok(previews)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_keyed_by_pull_request_url() {
        let out = "PULL REQUEST                                 NAMESPACE                 APPLICATION
https://github.com/acme/bdd-app/pull/1       jx-acme-bdd-app-pr-1      http://bdd-app.preview.34.123.71.97.nip.io
https://github.com/acme/other/pull/7         jx-acme-other-pr-7        http://other.preview.34.123.71.97.nip.io
";
        let previews = parse_previews(out).unwrap();
        assert_eq!(previews.len(), 2);

        let preview = &previews["https://github.com/acme/bdd-app/pull/1"];
        assert_eq!(preview.namespace, "jx-acme-bdd-app-pr-1");
        assert_eq!(preview.url, "http://bdd-app.preview.34.123.71.97.nip.io");
    }

    #[test]
    fn deploying_preview_has_an_empty_url() {
        let out = "PULL REQUEST                            NAMESPACE
https://github.com/acme/bdd-app/pull/2  jx-acme-bdd-app-pr-2
";
        let previews = parse_previews(out).unwrap();
        assert_eq!(previews["https://github.com/acme/bdd-app/pull/2"].url, "");
    }

    #[test]
    fn missing_header_is_an_error() {
        let err = parse_previews("no previews here").unwrap_err();
        assert!(matches!(err, ParseError::MissingHeader { .. }));
    }

    #[test]
    fn one_column_row_is_malformed() {
        let out = "PULL REQUEST NAMESPACE APPLICATION\nhttps://github.com/acme/bdd-app/pull/3\n";
        let err = parse_previews(out).unwrap_err();
        assert!(matches!(err, ParseError::MalformedRow { .. }));
    }
}
