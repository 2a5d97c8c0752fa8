use std::{env, fmt, fs, path::Path};

use serde_json::{Map, Value};

use crate::{errors::Error, Result};

pub const BOT_TOKEN_VAR: &str = "CHAT_BOT_TOKEN";
pub const SHEET_ID_VAR: &str = "SHEET_ID";
pub const SERVICE_ACCOUNT_VAR: &str = "SERVICE_ACCOUNT_JSON";

/// Typed settings for the bot: the three credentials it cannot start without.
#[derive(Clone)]
pub struct Settings {
    pub bot_token: String,
    pub sheet_id: String,
    /// Parsed service-account key (a JSON object).
    pub service_account: Map<String, Value>,
}

impl Settings {
    /// Load from the process environment, after merging `.env` if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = required(&lookup, BOT_TOKEN_VAR)?;
        let sheet_id = required(&lookup, SHEET_ID_VAR)?;
        let raw_account = required(&lookup, SERVICE_ACCOUNT_VAR)?;

        let parsed: Value =
            serde_json::from_str(&raw_account).map_err(|source| Error::InvalidCredentials {
                var: SERVICE_ACCOUNT_VAR,
                source,
            })?;
        let Value::Object(service_account) = parsed else {
            return Err(Error::Config(format!(
                "{SERVICE_ACCOUNT_VAR} must be a JSON object"
            )));
        };

        Ok(Self {
            bot_token,
            sheet_id,
            service_account,
        })
    }
}

// Keep secrets out of logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("bot_token", &"<redacted>")
            .field("sheet_id", &self.sheet_id)
            .field(
                "service_account",
                &format_args!("<{} keys>", self.service_account.len()),
            )
            .finish()
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Config(format!(
            "{key} environment variable is required"
        ))),
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ACCOUNT: &str =
        r#"{"type":"service_account","client_email":"bot@proj.iam.gserviceaccount.com"}"#;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn all_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            (BOT_TOKEN_VAR, "123:abc"),
            (SHEET_ID_VAR, "sheet-1"),
            (SERVICE_ACCOUNT_VAR, ACCOUNT),
        ]
    }

    #[test]
    fn loads_all_three_values_verbatim() {
        let s = Settings::from_lookup(lookup(&all_vars())).unwrap();
        assert_eq!(s.bot_token, "123:abc");
        assert_eq!(s.sheet_id, "sheet-1");
        assert_eq!(
            Value::Object(s.service_account),
            serde_json::from_str::<Value>(ACCOUNT).unwrap()
        );
    }

    #[test]
    fn missing_variable_is_named_in_error() {
        for missing in [BOT_TOKEN_VAR, SHEET_ID_VAR, SERVICE_ACCOUNT_VAR] {
            let vars: Vec<_> = all_vars()
                .into_iter()
                .filter(|(k, _)| *k != missing)
                .collect();
            let err = Settings::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{err}");
            assert!(err.to_string().contains(missing), "{err}");
        }
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut vars = all_vars();
        vars[1] = (SHEET_ID_VAR, "   ");
        let err = Settings::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains(SHEET_ID_VAR));
    }

    #[test]
    fn malformed_credentials_are_a_parse_error() {
        let mut vars = all_vars();
        vars[2] = (SERVICE_ACCOUNT_VAR, "{not json");
        let err = Settings::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidCredentials {
                var: SERVICE_ACCOUNT_VAR,
                ..
            }
        ));

        vars[2] = (SERVICE_ACCOUNT_VAR, "[1, 2]");
        let err = Settings::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let s = Settings::from_lookup(lookup(&all_vars())).unwrap();
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("123:abc"));
        assert!(!dbg.contains("client_email"));
        assert!(dbg.contains("sheet-1"));
    }

    #[test]
    fn dotenv_parsing_strips_quotes_and_comments() {
        let parsed = parse_dotenv(
            "# comment\nSHEET_ID=\"abc\"\nexport CHAT_BOT_TOKEN='t:1'\nbroken\n=nokey\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("SHEET_ID".to_string(), "abc".to_string()),
                ("CHAT_BOT_TOKEN".to_string(), "t:1".to_string()),
            ]
        );
    }
}
