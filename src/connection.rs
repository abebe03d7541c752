//! Connection string assembly. The application stores the string verbatim, so
//! the field order and the fixed parameters must not change.

/// SA password baked into the generated container and every connection string.
pub const SA_PASSWORD: &str = "bigStrongPassword8@";

/// Host side of a `host:container` port spec, or the spec itself.
pub fn host_port(port: &str) -> &str {
    port.split(':').next().unwrap_or(port)
}

/// Database name for a snapshot path: file name up to its first `.`.
pub fn database_name(snapshot_path: &str) -> String {
    let file = snapshot_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(snapshot_path);
    file.split('.').next().unwrap_or(file).to_string()
}

pub fn assemble(port: &str, container_name: &str, database_name: &str) -> String {
    format!(
        "Data Source=localhost,{};Initial Catalog={database_name};User ID=SA;Password={SA_PASSWORD};\
Connect Timeout=30;Encrypt=True;Trust Server Certificate=True;Authentication=SqlPassword;\
Application Name={container_name};Connect Retry Count=1;Connect Retry Interval=10;Command Timeout=30",
        host_port(port)
    )
}

/// Split a connection string into ordered `(key, value)` pairs.
pub fn parse(connection_string: &str) -> Vec<(String, String)> {
    connection_string
        .split(';')
        .filter(|part| !part.trim().is_empty())
        .filter_map(|part| {
            let (k, v) = part.split_once('=')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

pub fn get<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}
