use crate::error::{Error, Result};

const SAFE: [char; 4] = [' ', '.', '_', ':'];

/// Reduce `name` to characters that are safe in a file or directory name.
pub fn make_filename(name: &str) -> Result<String> {
    let safe = name
        .chars()
        .filter(|c| c.is_alphanumeric() || SAFE.contains(c))
        .collect::<String>();
    let safe = safe.trim_end();
    if safe.is_empty() {
        return Err(Error::EmptyFilename(name.to_string()));
    }
    Ok(safe.to_string())
}

/// Decode the HTML the thread API embeds in subjects, comments and file names.
///
/// `<br>` becomes a newline, every other tag is dropped, and named or numeric
/// character references are decoded. Unknown references are kept verbatim.
pub fn unescape_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(pos) = rest.find(['<', '&']) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if rest.starts_with('<') {
            match rest.find('>') {
                Some(end) => {
                    let tag = rest[1..end].trim().to_ascii_lowercase();
                    if tag == "br" || tag == "br/" || tag == "br /" {
                        out.push('\n');
                    }
                    rest = &rest[end + 1..];
                }
                None => {
                    out.push_str(rest);
                    rest = "";
                }
            }
            continue;
        }

        match rest.find(';').and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end))) {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(value)
        }
    }
}
