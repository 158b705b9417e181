//! Cookie-carrying HTTP session over a single libcurl easy handle.
//!
//! The handle's in-memory cookie engine is the session's jar: every request
//! goes through the same handle, so cookies set by one response are sent on
//! the next. Options are reset between requests; the jar survives resets.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str;
use thiserror::Error;

use crate::config::HttpConfig;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{0}")]
    Curl(#[from] curl::Error),
    #[error("multipart form: {0}")]
    Form(#[from] curl::FormError),
    #[error("malformed cookie line: {0}")]
    CookieLine(String),
    #[error("cookie {name} for {domain} was rejected by the cookie engine")]
    CookieRejected { name: String, domain: String },
}

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u32,
    pub body: Vec<u8>,
}

impl Response {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// One cookie in Netscape cookie-file terms (the format libcurl imports and exports).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Unix expiry; 0 means a session cookie.
    pub expires: i64,
    pub name: String,
    pub value: String,
}

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

fn flag(b: bool) -> &'static str {
    if b {
        "TRUE"
    } else {
        "FALSE"
    }
}

impl Cookie {
    /// Host-only, path `/`, non-expiring cookie.
    pub fn host_only(host: &str, name: &str, value: &str) -> Self {
        Self {
            domain: host.to_string(),
            include_subdomains: false,
            path: "/".to_string(),
            secure: false,
            http_only: false,
            expires: 0,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Parse one tab-separated Netscape line as produced by `CURLINFO_COOKIELIST`.
    pub fn parse_netscape(line: &str) -> Result<Self, HttpError> {
        let malformed = || HttpError::CookieLine(line.to_string());
        let (http_only, rest) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let fields: Vec<&str> = rest.split('\t').collect();
        if fields.len() < 6 || fields.len() > 7 {
            return Err(malformed());
        }
        Ok(Self {
            domain: fields[0].to_string(),
            include_subdomains: fields[1].eq_ignore_ascii_case("TRUE"),
            path: fields[2].to_string(),
            secure: fields[3].eq_ignore_ascii_case("TRUE"),
            http_only,
            expires: fields[4].parse().map_err(|_| malformed())?,
            name: fields[5].to_string(),
            value: fields.get(6).copied().unwrap_or("").to_string(),
        })
    }

    pub fn to_netscape(&self) -> String {
        format!(
            "{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
            if self.http_only { HTTP_ONLY_PREFIX } else { "" },
            self.domain,
            flag(self.include_subdomains),
            self.path,
            flag(self.secure),
            self.expires,
            self.name,
            self.value
        )
    }
}

/// A part of a multipart/form-data request.
#[derive(Debug, Clone)]
pub enum FormField<'a> {
    Text { name: &'a str, value: &'a str },
    File {
        name: &'a str,
        path: &'a Path,
        content_type: &'a str,
    },
}

/// Authenticated (or about to be) session against the remote service.
pub struct Session {
    easy: curl::easy::Easy,
    http: HttpConfig,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("http", &self.http).finish()
    }
}

impl Session {
    pub fn new(http: &HttpConfig) -> Result<Self, HttpError> {
        let mut easy = curl::easy::Easy::new();
        easy.cookie_file("")?;
        Ok(Self {
            easy,
            http: http.clone(),
        })
    }

    /// Reset per-request options; keeps cookies and connections.
    fn prepare(&mut self, url: &str, follow_redirects: bool) -> Result<(), HttpError> {
        self.easy.reset();
        self.easy.cookie_file("")?;
        self.easy.url(url)?;
        self.easy.follow_location(follow_redirects)?;
        if follow_redirects {
            self.easy.max_redirections(10)?;
        }
        if let Some(d) = self.http.connect_timeout() {
            self.easy.connect_timeout(d)?;
        }
        if let Some(d) = self.http.timeout() {
            self.easy.timeout(d)?;
        }
        // libcurl would otherwise wait on `Expect: 100-continue` for larger bodies.
        let mut headers = curl::easy::List::new();
        headers.append("Expect:")?;
        self.easy.http_headers(headers)?;
        Ok(())
    }

    fn perform(&mut self) -> Result<Response, HttpError> {
        let mut body = Vec::new();
        {
            let mut transfer = self.easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }
        let status = self.easy.response_code()?;
        Ok(Response { status, body })
    }

    pub fn get(&mut self, url: &str) -> Result<Response, HttpError> {
        self.prepare(url, true)?;
        self.easy.get(true)?;
        self.perform()
    }

    /// POST `application/x-www-form-urlencoded` fields.
    pub fn post_form(
        &mut self,
        url: &str,
        fields: &[(&str, &str)],
        follow_redirects: bool,
    ) -> Result<Response, HttpError> {
        self.prepare(url, follow_redirects)?;
        let mut pairs = Vec::with_capacity(fields.len());
        for (k, v) in fields {
            let k = self.easy.url_encode(k.as_bytes());
            let v = self.easy.url_encode(v.as_bytes());
            pairs.push(format!("{}={}", k, v));
        }
        let encoded = pairs.join("&");
        self.easy.post(true)?;
        self.easy.post_fields_copy(encoded.as_bytes())?;
        self.perform()
    }

    /// POST `multipart/form-data`. Repeated names are sent in the given order.
    pub fn post_multipart(
        &mut self,
        url: &str,
        fields: &[FormField<'_>],
    ) -> Result<Response, HttpError> {
        self.prepare(url, true)?;
        let mut form = curl::easy::Form::new();
        for field in fields {
            match field {
                FormField::Text { name, value } => {
                    form.part(name).contents(value.as_bytes()).add()?;
                }
                FormField::File {
                    name,
                    path,
                    content_type,
                } => {
                    form.part(name).file(path).content_type(content_type).add()?;
                }
            }
        }
        self.easy.httppost(form)?;
        self.perform()
    }

    /// Every cookie currently in the jar.
    pub fn cookies(&mut self) -> Result<Vec<Cookie>, HttpError> {
        let list = self.easy.cookies()?;
        list.iter()
            .filter_map(|raw| str::from_utf8(raw).ok())
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(Cookie::parse_netscape)
            .collect()
    }

    /// Add `cookie` to the jar. libcurl drops cookies it refuses (e.g. a
    /// `__Secure-` name without the secure flag) without an error, so the jar
    /// is read back to confirm the cookie landed.
    pub fn add_cookie(&mut self, cookie: &Cookie) -> Result<(), HttpError> {
        self.easy.cookie_list(&cookie.to_netscape())?;
        let landed = self
            .cookies()?
            .iter()
            .any(|c| c.name == cookie.name && c.value == cookie.value);
        if !landed {
            return Err(HttpError::CookieRejected {
                name: cookie.name.clone(),
                domain: cookie.domain.clone(),
            });
        }
        Ok(())
    }

    /// Value of the first cookie whose name contains `marker`.
    pub fn session_token(&mut self, marker: &str) -> Result<Option<String>, HttpError> {
        Ok(self
            .cookies()?
            .into_iter()
            .find(|c| c.name.contains(marker))
            .map(|c| c.value))
    }
}
