//! Minimal `.torrent` descriptor reader
//!
//! Only what the orchestrator needs: the info-hash (used as the client-side job id) and the list
//! of payload files. The bencode decoder keeps a borrowed slice of every dictionary so the
//! info-hash can be computed over the exact bytes of the `info` dictionary.

use sha1::{Digest, Sha1};

const MAX_DEPTH: usize = 64;

/// A payload file listed by a descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptorFile {
    /// Path relative to the torrent root, `/`-separated
    pub path: String,
    /// Size in bytes
    pub length: u64,
}

/// Parsed transfer descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TorrentDescriptor {
    /// Lower-case hex SHA-1 of the bencoded `info` dictionary
    pub info_hash: String,
    /// Torrent name (file name for single-file torrents)
    pub name: String,
    /// Payload files
    pub files: Vec<DescriptorFile>,
}

impl TorrentDescriptor {
    /// Parse descriptor bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let mut decoder = Decoder {
            buf: bytes,
            pos: 0,
        };
        let root = decoder.value(0)?;
        if decoder.pos != bytes.len() {
            return Err(format!("trailing data at offset {}", decoder.pos));
        }

        let Value::Dict { entries, .. } = root else {
            return Err("top-level value is not a dictionary".to_string());
        };
        let Some(Value::Dict { entries: info, raw }) = lookup(&entries, b"info") else {
            return Err("missing `info` dictionary".to_string());
        };

        let name = match lookup(info, b"name") {
            Some(Value::Bytes(b)) => String::from_utf8_lossy(b).into_owned(),
            _ => return Err("missing `info.name`".to_string()),
        };

        let files = match (lookup(info, b"files"), lookup(info, b"length")) {
            (Some(Value::List(list)), _) => list
                .iter()
                .map(file_entry)
                .collect::<Result<Vec<_>, _>>()?,
            (None, Some(Value::Int(length))) => vec![DescriptorFile {
                path: name.clone(),
                length: u64::try_from(*length).map_err(|_| "negative `info.length`")?,
            }],
            _ => return Err("`info` has neither `files` nor `length`".to_string()),
        };

        Ok(Self {
            info_hash: format!("{:x}", Sha1::digest(raw)),
            name,
            files,
        })
    }

    /// Whether the descriptor has exactly one payload file
    pub fn is_single_file(&self) -> bool {
        self.files.len() == 1
    }
}

fn file_entry(value: &Value<'_>) -> Result<DescriptorFile, String> {
    let Value::Dict { entries, .. } = value else {
        return Err("`info.files` entry is not a dictionary".to_string());
    };
    let length = match lookup(entries, b"length") {
        Some(Value::Int(n)) => u64::try_from(*n).map_err(|_| "negative file length")?,
        _ => return Err("file entry without `length`".to_string()),
    };
    let path = match lookup(entries, b"path") {
        Some(Value::List(parts)) => parts
            .iter()
            .map(|p| match p {
                Value::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
                _ => Err("file path component is not a string".to_string()),
            })
            .collect::<Result<Vec<_>, _>>()?
            .join("/"),
        _ => return Err("file entry without `path`".to_string()),
    };
    Ok(DescriptorFile { path, length })
}

fn lookup<'v, 'a>(entries: &'v [(&'a [u8], Value<'a>)], key: &[u8]) -> Option<&'v Value<'a>> {
    entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
}

enum Value<'a> {
    Int(i64),
    Bytes(&'a [u8]),
    List(Vec<Value<'a>>),
    Dict {
        entries: Vec<(&'a [u8], Value<'a>)>,
        raw: &'a [u8],
    },
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn peek(&self) -> Result<u8, String> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or_else(|| "unexpected end of data".to_string())
    }

    fn value(&mut self, depth: usize) -> Result<Value<'a>, String> {
        if depth > MAX_DEPTH {
            return Err("nesting too deep".to_string());
        }
        match self.peek()? {
            b'i' => {
                self.pos += 1;
                let n = self.number(b'e')?;
                Ok(Value::Int(n))
            }
            b'l' => {
                self.pos += 1;
                let mut items = Vec::new();
                while self.peek()? != b'e' {
                    items.push(self.value(depth + 1)?);
                }
                self.pos += 1;
                Ok(Value::List(items))
            }
            b'd' => {
                let start = self.pos;
                self.pos += 1;
                let mut entries = Vec::new();
                while self.peek()? != b'e' {
                    let key = self.bytes()?;
                    let value = self.value(depth + 1)?;
                    entries.push((key, value));
                }
                self.pos += 1;
                Ok(Value::Dict {
                    entries,
                    raw: &self.buf[start..self.pos],
                })
            }
            b'0'..=b'9' => self.bytes().map(Value::Bytes),
            other => Err(format!(
                "unexpected byte {:#04x} at offset {}",
                other, self.pos
            )),
        }
    }

    fn bytes(&mut self) -> Result<&'a [u8], String> {
        let len = self.number(b':')?;
        let len = usize::try_from(len).map_err(|_| "negative string length".to_string())?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| "string runs past end of data".to_string())?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn number(&mut self, terminator: u8) -> Result<i64, String> {
        let start = self.pos;
        while self.peek()? != terminator {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.buf[start..self.pos])
            .map_err(|_| format!("invalid number at offset {start}"))?;
        self.pos += 1;
        text.parse::<i64>()
            .map_err(|_| format!("invalid number `{text}` at offset {start}"))
    }
}
