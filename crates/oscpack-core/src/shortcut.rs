//! Message shortcuts
//!
//! A shortcut maps a numeric id to an `(address, typetags)` signature. A
//! message with a registered signature can travel as
//!
//! ```text
//! /@ ,ib <id> <blob of the argument payload>
//! ```
//!
//! and the receiver restores address and typetags from its own table.
//!
//! Definition files hold one shortcut per line:
//!
//! ```text
//! /.shortcut iss 1234 /foo/bar sfi
//! /.shortcut iss 7 /ping ""
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use bytes::BytesMut;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::codec::{DecodeOptions, Encoding};
use crate::packet::Message;
use crate::types::{Argument, Charset};
use crate::{address, pack, plain, tagger, Error, Result};
use crate::{PACK_SENTINEL, SHORTCUT_ADDRESS};

/// Leading tokens of a definition line
const DEFINITION_PREFIX: &str = "/.shortcut";
const DEFINITION_TYPES: &str = "iss";

/// One registered signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shortcut {
    pub id: i32,
    pub address: String,
    /// Typetags without the leading comma
    pub typetags: String,
}

impl Shortcut {
    pub fn new(id: i32, address: impl Into<String>, typetags: impl Into<String>) -> Self {
        let typetags = typetags.into();
        let typetags = match typetags.strip_prefix(',') {
            Some(rest) => rest.to_string(),
            None => typetags,
        };
        Self {
            id,
            address: address.into(),
            typetags,
        }
    }

    /// Lookup key: address and typetags joined by a space
    pub fn symbol(&self) -> String {
        symbol(&self.address, &self.typetags)
    }
}

fn symbol(address: &str, typetags: &str) -> String {
    format!("{} {}", address, typetags)
}

#[derive(Debug, Default)]
struct Tables {
    by_id: HashMap<i32, Shortcut>,
    by_symbol: HashMap<String, i32>,
}

/// Shared, thread-safe shortcut registry.
///
/// Ids and symbols are both unique; each resolves to the same record.
#[derive(Debug, Default)]
pub struct ShortcutTable {
    tables: RwLock<Tables>,
}

impl ShortcutTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shortcut. Fails if the id or the signature is taken.
    pub fn insert(&self, shortcut: Shortcut) -> Result<()> {
        address::validate(&shortcut.address)?;
        tagger::parse(&shortcut.typetags)?;

        let symbol = shortcut.symbol();
        let mut tables = self.tables.write();

        if tables.by_id.contains_key(&shortcut.id) {
            return Err(Error::ShortcutConflict(format!("id {} already registered", shortcut.id)));
        }
        if tables.by_symbol.contains_key(&symbol) {
            return Err(Error::ShortcutConflict(format!("{:?} already registered", symbol)));
        }

        tables.by_symbol.insert(symbol, shortcut.id);
        tables.by_id.insert(shortcut.id, shortcut);
        Ok(())
    }

    /// Remove by id, returning the removed record
    pub fn remove(&self, id: i32) -> Option<Shortcut> {
        let mut tables = self.tables.write();
        let removed = tables.by_id.remove(&id)?;
        tables.by_symbol.remove(&removed.symbol());
        Some(removed)
    }

    pub fn get_by_id(&self, id: i32) -> Option<Shortcut> {
        self.tables.read().by_id.get(&id).cloned()
    }

    pub fn get_by_symbol(&self, address: &str, typetags: &str) -> Option<Shortcut> {
        let tables = self.tables.read();
        let id = tables.by_symbol.get(&symbol(address, typetags))?;
        tables.by_id.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().by_id.is_empty()
    }

    pub fn clear(&self) {
        let mut tables = self.tables.write();
        tables.by_id.clear();
        tables.by_symbol.clear();
    }

    /// Load definitions from text. Non-conforming lines and conflicts are
    /// skipped. Returns the number of shortcuts added.
    pub fn load_str(&self, text: &str) -> usize {
        let mut added = 0;
        for (lineno, line) in text.lines().enumerate() {
            let shortcut = match parse_definition(line) {
                Some(s) => s,
                None => {
                    if !line.trim().is_empty() {
                        debug!("Skipping shortcut line {}: {:?}", lineno + 1, line);
                    }
                    continue;
                }
            };
            match self.insert(shortcut) {
                Ok(()) => added += 1,
                Err(e) => debug!("Skipping shortcut line {}: {}", lineno + 1, e),
            }
        }
        added
    }

    /// Load a definition file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let added = self.load_str(&text);
        info!("Loaded {} shortcuts from {}", added, path.display());
        Ok(added)
    }

    /// Write the table back out in definition-file form, ordered by id
    pub fn to_definition_string(&self) -> String {
        let tables = self.tables.read();
        let mut ids: Vec<&i32> = tables.by_id.keys().collect();
        ids.sort();

        let mut out = String::new();
        for id in ids {
            if let Some(s) = tables.by_id.get(id) {
                let tags = if s.typetags.is_empty() { "\"\"" } else { s.typetags.as_str() };
                let _ = writeln!(
                    out,
                    "{} {} {} {} {}",
                    DEFINITION_PREFIX, DEFINITION_TYPES, s.id, s.address, tags
                );
            }
        }
        out
    }

    /// Rewrite `msg` into its `/@` form if its signature is registered.
    ///
    /// The argument payload is written in `encoding`; Pack payloads keep
    /// their `!` so the receiver can tell them apart.
    pub fn compress(
        &self,
        msg: &Message,
        encoding: Encoding,
        charset: Charset,
    ) -> Result<Option<Message>> {
        if msg.address() == SHORTCUT_ADDRESS {
            return Ok(None);
        }
        let shortcut = match self.get_by_symbol(msg.address(), &msg.typetags()) {
            Some(s) => s,
            None => return Ok(None),
        };

        let payload = match encoding {
            Encoding::Plain => {
                let mut buf = BytesMut::new();
                plain::encode_arguments(&mut buf, msg.arguments(), charset)?;
                buf.to_vec()
            }
            Encoding::Pack => {
                let mut buf = vec![PACK_SENTINEL];
                pack::encode_arguments(&mut buf, msg.arguments())?;
                buf
            }
        };

        let mut short = Message::with_args(
            SHORTCUT_ADDRESS,
            vec![Argument::Int(shortcut.id), Argument::Blob(payload)],
        )?;
        short.set_charset(charset);
        short.set_encoding(encoding);
        short.set_source(msg.source());
        Ok(Some(short))
    }

    /// Restore a `/@` message. Returns `Ok(None)` for messages that are not
    /// compressed and [`Error::UnknownShortcut`] for unregistered ids.
    pub fn expand(&self, msg: &Message, opts: &DecodeOptions) -> Result<Option<Message>> {
        let (id, payload) = match compressed_parts(msg) {
            Some(parts) => parts,
            None => return Ok(None),
        };
        let shortcut = self.get_by_id(id).ok_or(Error::UnknownShortcut(id))?;

        let mut expanded =
            Message::from_payload(shortcut.address, &shortcut.typetags, payload, opts)?;
        expanded.set_source(msg.source());
        Ok(Some(expanded))
    }
}

/// True for messages in the `/@ ,ib` form (an `i` id, then a `b` payload)
pub fn is_compressed(msg: &Message) -> bool {
    compressed_parts(msg).is_some()
}

fn compressed_parts(msg: &Message) -> Option<(i32, &[u8])> {
    if msg.address() != SHORTCUT_ADDRESS {
        return None;
    }
    match msg.arguments() {
        [Argument::Int(id), Argument::Blob(payload)] => Some((*id, payload.as_slice())),
        _ => None,
    }
}

fn parse_definition(line: &str) -> Option<Shortcut> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [DEFINITION_PREFIX, DEFINITION_TYPES, id, address, tags] => {
            let id = id.parse().ok()?;
            let tags = match *tags {
                "\"\"" | "''" => "",
                t => t,
            };
            Some(Shortcut::new(id, *address, tags))
        }
        _ => None,
    }
}
