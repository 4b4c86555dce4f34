use super::record::qualify;
use super::{Result, ZoneError, ZoneRecord, constants};
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::resource::DNSResource;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Parse zone-file text into wire-format records.
///
/// `origin_hint` is the initial `$ORIGIN` (may be empty when every owner is
/// absolute); `source_label` names the source in error messages and anchors
/// relative `$INCLUDE` paths.
pub fn parse_zone_text(
    bytes: &[u8],
    origin_hint: &str,
    source_label: &str,
) -> Result<Vec<DNSResource>> {
    if bytes.len() > constants::MAX_ZONE_FILE_SIZE {
        return Err(ZoneError::FileTooLarge {
            limit: constants::MAX_ZONE_FILE_SIZE,
        });
    }
    let contents = std::str::from_utf8(bytes)
        .map_err(|e| ZoneError::malformed(source_label, 0, format!("invalid UTF-8: {}", e)))?;

    let mut parser = ZoneParser::new(origin_hint, source_label);
    parser.parse(contents)
}

/// One record or directive after comments and parentheses are folded away.
#[derive(Debug)]
struct LogicalLine {
    number: usize,
    text: String,
    /// Leading whitespace means "same owner as the previous record"
    inherits_owner: bool,
}

/// RFC 1035 zone file parser
pub struct ZoneParser {
    /// Current origin for relative names (fully qualified or empty)
    current_origin: String,
    /// Value of the last `$TTL` directive
    current_ttl: Option<u32>,
    /// Last explicit TTL, used when neither a TTL field nor `$TTL` is present
    last_ttl: u32,
    /// Class of the previous record
    current_class: DNSResourceClass,
    /// Owner of the previous record
    last_owner: Option<String>,
    source_label: String,
    include_depth: usize,
}

impl ZoneParser {
    pub fn new(origin_hint: &str, source_label: &str) -> Self {
        let origin = origin_hint.trim();
        Self {
            current_origin: if origin.is_empty() || origin == "." {
                String::new()
            } else {
                qualify(origin, "")
            },
            current_ttl: None,
            last_ttl: constants::DEFAULT_TTL,
            current_class: DNSResourceClass::IN,
            last_owner: None,
            source_label: source_label.to_string(),
            include_depth: 0,
        }
    }

    /// Parse zone file contents
    pub fn parse(&mut self, contents: &str) -> Result<Vec<DNSResource>> {
        let mut records = Vec::new();

        for line in self.logical_lines(contents)? {
            trace!("Parsing line {}: {}", line.number, line.text);

            if !line.inherits_owner && line.text.starts_with('$') {
                self.parse_directive(&line, &mut records)?;
                continue;
            }

            let record = self
                .parse_record(&line)
                .map_err(|e| ZoneError::malformed(&self.source_label, line.number, e))?;
            let resource = record
                .to_dns_resource(&self.current_origin)
                .map_err(|e| ZoneError::malformed(&self.source_label, line.number, e))?;
            records.push(resource);
        }

        debug!(
            "Parsed {} records from {}",
            records.len(),
            self.source_label
        );
        Ok(records)
    }

    /// Strip comments and fold parenthesised continuations into single lines.
    fn logical_lines(&self, contents: &str) -> Result<Vec<LogicalLine>> {
        let mut lines = Vec::new();
        let mut pending: Option<LogicalLine> = None;
        let mut depth = 0usize;

        for (idx, raw) in contents.lines().enumerate() {
            let number = idx + 1;
            let mut text = String::new();
            let mut in_quotes = false;

            for ch in raw.chars() {
                match ch {
                    '"' => {
                        in_quotes = !in_quotes;
                        text.push(ch);
                    }
                    ';' if !in_quotes => break,
                    '(' if !in_quotes => {
                        depth += 1;
                        text.push(' ');
                    }
                    ')' if !in_quotes => {
                        depth = depth.checked_sub(1).ok_or_else(|| {
                            ZoneError::malformed(&self.source_label, number, "unbalanced ')'")
                        })?;
                        text.push(' ');
                    }
                    _ => text.push(ch),
                }
            }

            match pending.as_mut() {
                Some(line) => {
                    line.text.push(' ');
                    line.text.push_str(text.trim());
                }
                None => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    pending = Some(LogicalLine {
                        number,
                        inherits_owner: text.starts_with([' ', '\t']),
                        text: text.trim().to_string(),
                    });
                }
            }

            if depth == 0 {
                if let Some(line) = pending.take() {
                    lines.push(line);
                }
            }
        }

        if let Some(line) = pending {
            return Err(ZoneError::malformed(
                &self.source_label,
                line.number,
                format!("Unclosed parentheses starting at line {}", line.number),
            ));
        }

        Ok(lines)
    }

    /// Parse a directive line
    fn parse_directive(&mut self, line: &LogicalLine, records: &mut Vec<DNSResource>) -> Result<()> {
        let parts: Vec<&str> = line.text.split_whitespace().collect();
        let malformed = |msg: &str| ZoneError::malformed(&self.source_label, line.number, msg);

        match parts[0].to_uppercase().as_str() {
            "$ORIGIN" => {
                let origin = parts
                    .get(1)
                    .ok_or_else(|| malformed("$ORIGIN requires domain name"))?;
                self.current_origin = qualify(origin, &self.current_origin);
                debug!("Set origin to: {}", self.current_origin);
            }
            "$TTL" => {
                let value = parts.get(1).ok_or_else(|| malformed("$TTL requires value"))?;
                let ttl = parse_ttl(value).ok_or_else(|| malformed("invalid $TTL value"))?;
                self.current_ttl = Some(ttl);
                debug!("Set default TTL to: {}", ttl);
            }
            "$INCLUDE" => {
                let file = parts
                    .get(1)
                    .ok_or_else(|| malformed("$INCLUDE requires file path"))?;
                if self.include_depth >= constants::MAX_INCLUDE_DEPTH {
                    return Err(malformed("$INCLUDE nested too deeply"));
                }
                let origin = match parts.get(2) {
                    Some(domain) => qualify(domain, &self.current_origin),
                    None => self.current_origin.clone(),
                };

                let path = self.include_path(file);
                debug!("Processing $INCLUDE {} {}", path.display(), origin);
                let contents = fs::read_to_string(&path).map_err(|e| {
                    malformed(&format!(
                        "Failed to read include file {}: {}",
                        path.display(),
                        e
                    ))
                })?;

                let mut nested = ZoneParser::new(&origin, &path.to_string_lossy());
                nested.current_ttl = self.current_ttl;
                nested.last_ttl = self.last_ttl;
                nested.current_class = self.current_class;
                nested.include_depth = self.include_depth + 1;
                records.extend(nested.parse(&contents)?);
            }
            _ => {
                debug!("Ignoring unsupported directive: {}", parts[0]);
            }
        }

        Ok(())
    }

    fn include_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match Path::new(&self.source_label).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Parse a resource record line
    fn parse_record(&mut self, line: &LogicalLine) -> std::result::Result<ZoneRecord, String> {
        let parts = tokenize(&line.text);
        let mut idx = 0;

        let owner = if line.inherits_owner {
            self.last_owner
                .clone()
                .ok_or_else(|| "record has no owner and no previous owner".to_string())?
        } else {
            let name = parts.first().ok_or("Empty record line")?;
            idx += 1;
            qualify(name, &self.current_origin)
        };

        let mut ttl = None;
        let mut class = None;
        let mut rtype = None;

        // TTL and class are optional and may come in either order
        while idx < parts.len() {
            let field = &parts[idx];
            idx += 1;

            if ttl.is_none() {
                if let Some(value) = parse_ttl(field) {
                    ttl = Some(value);
                    continue;
                }
            }
            if class.is_none() {
                if let Some(parsed) = DNSResourceClass::from_mnemonic(field) {
                    class = Some(parsed);
                    continue;
                }
            }
            match DNSResourceType::from_mnemonic(field) {
                Some(parsed) => {
                    rtype = Some(parsed);
                    break;
                }
                None => return Err(format!("Invalid field: {}", field)),
            }
        }

        let rtype = rtype.ok_or("Missing record type")?;
        if idx >= parts.len() {
            return Err("Missing RDATA".to_string());
        }
        let rdata = parts[idx..].join(" ");

        let ttl = match ttl {
            Some(value) => {
                self.last_ttl = value;
                value
            }
            None => self.current_ttl.unwrap_or(self.last_ttl),
        };
        let class = class.unwrap_or(self.current_class);
        self.current_class = class;
        self.last_owner = Some(owner.clone());

        Ok(ZoneRecord::new(owner, ttl, class, rtype, rdata))
    }
}

/// Split on whitespace, keeping quoted strings (quotes included) intact.
fn tokenize(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Parse TTL value (supports suffixes like 1h, 30m, 1h30m)
fn parse_ttl(s: &str) -> Option<u32> {
    if s.is_empty() || !s.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let mut total: u32 = 0;
    let mut number = String::new();
    for ch in s.to_ascii_lowercase().chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let multiplier = match ch {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86400,
            'w' => 604800,
            _ => return None,
        };
        let value: u32 = number.parse().ok()?;
        total = total.checked_add(value.checked_mul(multiplier)?)?;
        number.clear();
    }
    if !number.is_empty() {
        total = total.checked_add(number.parse().ok()?)?;
    }
    Some(total)
}
