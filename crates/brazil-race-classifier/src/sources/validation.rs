use super::{
    candidate_archive_year, normalize_state, render_photo_url, SourceCatalog, UniqueMap,
    STATE_PLACEHOLDER,
};
use serde::Serialize;
use std::fmt;
use url::Url;

/// The 26 states plus the Federal District, as used in TSE file names.
pub const BRAZILIAN_STATES: [&str; 27] = [
    "AC", "AL", "AM", "AP", "BA", "CE", "DF", "ES", "GO", "MA", "MG", "MS", "MT", "PA", "PB",
    "PE", "PI", "PR", "RJ", "RN", "RO", "RR", "RS", "SC", "SE", "SP", "TO",
];

pub fn is_brazilian_state(code: &str) -> bool {
    BRAZILIAN_STATES.contains(&code)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceIssue {
    /// Dotted path of the offending entry, e.g. `photos.templates.2020`.
    pub key: String,
    pub message: String,
}

impl SourceIssue {
    fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub urls_checked: usize,
    pub issues: Vec<SourceIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.issues.push(SourceIssue::new(key, message));
    }

    fn check_url(&mut self, key: &str, raw: &str) -> Option<Url> {
        self.urls_checked += 1;
        match parse_http_url(raw) {
            Ok(url) => Some(url),
            Err(message) => {
                self.push(key, message);
                None
            }
        }
    }
}

pub(crate) fn validate(catalog: &SourceCatalog) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_unknown(&mut report, "", &catalog.unknown);
    check_unknown(&mut report, "defaults.", &catalog.defaults.unknown);
    check_unknown(&mut report, "photos.", &catalog.photos.unknown);
    check_states(&mut report, "defaults.states", &catalog.defaults.states);

    for (year, url) in catalog.candidates.iter() {
        let key = format!("candidates.{year}");
        check_year_key(&mut report, &key, year);
        if report.check_url(&key, url).is_none() {
            continue;
        }
        match candidate_archive_year(url) {
            None => report.push(
                &key,
                "URL does not name a consulta_cand_<year> archive, so the CSV member cannot be derived",
            ),
            Some(url_year) if url_year != year => report.push(
                &key,
                format!("URL points at the {url_year} archive but is listed under {year}"),
            ),
            Some(_) => {}
        }
    }

    if let Some(states) = &catalog.photos.states {
        check_states(&mut report, "photos.states", states);
    }

    for (year, template) in catalog.photos.templates.iter() {
        let key = format!("photos.templates.{year}");
        check_year_key(&mut report, &key, year);
        if !template.contains(STATE_PLACEHOLDER) {
            report.push(
                &key,
                format!("template has no {STATE_PLACEHOLDER} placeholder"),
            );
        }
        report.check_url(&key, &render_photo_url(template, "AC"));
    }

    for (name, url) in catalog.sources.iter() {
        report.check_url(&format!("sources.{name}"), url);
    }

    report
}

fn check_unknown(
    report: &mut ValidationReport,
    prefix: &str,
    unknown: &UniqueMap<serde_yaml::Value>,
) {
    for key in unknown.keys() {
        report.push(format!("{prefix}{key}"), "unknown key, ignored");
    }
}

fn parse_http_url(raw: &str) -> Result<Url, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("URL is empty".to_string());
    }
    let url = Url::parse(trimmed).map_err(|err| format!("'{trimmed}' is not a valid URL ({err})"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!(
            "'{trimmed}' uses scheme '{}', expected http or https",
            url.scheme()
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(format!("'{trimmed}' has no host"));
    }
    Ok(url)
}

fn check_year_key(report: &mut ValidationReport, key: &str, year: &str) {
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        report.push(key, format!("'{year}' is not a four-digit election year"));
    }
}

fn check_states(report: &mut ValidationReport, key: &str, states: &[String]) {
    let mut seen: Vec<String> = Vec::with_capacity(states.len());
    for raw in states {
        let state = normalize_state(raw);
        if !is_brazilian_state(&state) {
            report.push(key, format!("'{raw}' is not a Brazilian state code"));
        }
        if seen.contains(&state) {
            report.push(key, format!("state '{state}' is listed more than once"));
        } else {
            seen.push(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(raw: &str) -> SourceCatalog {
        SourceCatalog::from_yaml_str(raw).expect("catalog parses")
    }

    #[test]
    fn well_formed_catalog_has_no_issues() {
        let report = catalog(
            r#"
defaults:
  states: [AC, AM]
candidates:
  2020: https://cdn.tse.jus.br/estatistica/sead/odsele/consulta_cand/consulta_cand_2020.zip
photos:
  templates:
    2020: https://cdn.tse.jus.br/estatistica/sead/eleicoes/eleicoes2020/fotos/foto_cand2020_{UF}_div.zip
sources:
  isa_peoples: https://pib.socioambiental.org/pt/Quadro_Geral_dos_Povos
"#,
        )
        .validate();
        assert!(report.is_valid(), "unexpected issues: {:?}", report.issues);
        assert_eq!(report.urls_checked, 3);
    }

    #[test]
    fn flags_malformed_urls_and_schemes() {
        let report = catalog(
            "sources:\n  broken: not a url\n  ftp: ftp://example.org/data.zip\n  blank: ''\n",
        )
        .validate();
        let keys: Vec<&str> = report.issues.iter().map(|issue| issue.key.as_str()).collect();
        assert_eq!(keys, vec!["sources.broken", "sources.ftp", "sources.blank"]);
        assert!(report.issues[1].message.contains("scheme 'ftp'"));
    }

    #[test]
    fn flags_candidate_year_mismatches() {
        let report = catalog(
            "candidates:\n  2022: https://cdn.tse.jus.br/consulta_cand_2018.zip\n  20x4: https://cdn.tse.jus.br/other.zip\n",
        )
        .validate();
        assert_eq!(report.issues.len(), 3);
        assert!(report.issues[0].message.contains("2018 archive"));
        assert!(report.issues[1].message.contains("four-digit"));
        assert!(report.issues[2].message.contains("consulta_cand_<year>"));
    }

    #[test]
    fn flags_templates_without_placeholder() {
        let report = catalog(
            "photos:\n  templates:\n    2020: https://cdn.tse.jus.br/fotos/foto_cand2020_AC_div.zip\n",
        )
        .validate();
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].key, "photos.templates.2020");
    }

    #[test]
    fn flags_unknown_and_repeated_states() {
        let report = catalog("defaults:\n  states: [AC, XX, ac]\n").validate();
        let messages: Vec<String> = report.issues.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec![
                "defaults.states: 'XX' is not a Brazilian state code",
                "defaults.states: state 'AC' is listed more than once",
            ]
        );
    }

    #[test]
    fn reports_unknown_keys_without_failing_to_load() {
        let report = catalog(
            "candidate:\n  2020: https://example.org\ndefaults:\n  state: [AC]\nphotos:\n  template: x\n",
        )
        .validate();
        let keys: Vec<&str> = report.issues.iter().map(|issue| issue.key.as_str()).collect();
        assert_eq!(keys, vec!["candidate", "defaults.state", "photos.template"]);
        assert!(report.issues[0].message.contains("ignored"));
        assert_eq!(report.urls_checked, 0);
    }
}
