//! Keyed resource addressing and upload header values for the file service.

use std::fmt;

use crate::item::CollectionKey;

/// Header carrying the structured upload metadata.
pub const SLUG_HEADER: &str = "SLUG";
/// Header carrying the security token.
pub const CSRF_HEADER: &str = "x-csrf-token";
/// Header used to override the transport's content type.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
/// Content type sent for Outlook message files.
pub const OUTLOOK_MIME: &str = "application/vnd.ms-outlook";
/// Delimiter between slug segments.
pub const SLUG_DELIMITER: &str = "***";
/// Suffix that addresses an entity's raw media value.
pub const RAW_VALUE_SUFFIX: &str = "/$value";

/// An absolute entity path such as `/DocObjFileSet(Objecttype='..',...)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityPath(String);

impl EntityPath {
    /// Build a keyed path from an entity set and ordered key properties.
    /// Every value is percent-encoded.
    pub fn keyed(entity_set: &str, properties: &[(&str, &str)]) -> Self {
        let key = properties
            .iter()
            .map(|(name, value)| format!("{name}='{}'", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join(",");
        Self(format!("/{entity_set}({key})"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of a file-content entity, addressed by the full natural key.
pub fn content_entity_path(
    entity_set: &str,
    key: &CollectionKey,
    document_number: &str,
    file_id: &str,
) -> EntityPath {
    EntityPath::keyed(
        entity_set,
        &[
            ("Objecttype", key.object_type.as_str()),
            ("Objectkey", key.object_id.as_str()),
            ("Documenttype", key.document_type.as_str()),
            ("Documentnumber", document_number),
            ("FileId", file_id),
        ],
    )
}

/// Path of a plain file metadata entity.
pub fn file_entity_path(
    entity_set: &str,
    file_id: &str,
    document_number: &str,
    document_type: &str,
) -> EntityPath {
    EntityPath::keyed(
        entity_set,
        &[
            ("FileId", file_id),
            ("Documentnumber", document_number),
            ("Documenttype", document_type),
        ],
    )
}

/// Download link for a file, or `None` when the user may not read it.
pub fn download_url(
    service_url: &str,
    entity_set: &str,
    file_id: &str,
    document_number: &str,
    document_type: &str,
    permitted: bool,
) -> Option<String> {
    if !permitted {
        return None;
    }
    let path = file_entity_path(entity_set, file_id, document_number, document_type);
    Some(format!(
        "{}{}{}",
        service_url.trim_end_matches('/'),
        path,
        RAW_VALUE_SUFFIX
    ))
}

/// The `SLUG` header value: `***name***objectType***objectId***documentType***`.
pub fn slug(file_name: &str, key: &CollectionKey) -> String {
    let mut value = String::from(SLUG_DELIMITER);
    for segment in [
        file_name,
        key.object_type.as_str(),
        key.object_id.as_str(),
        key.document_type.as_str(),
    ] {
        value.push_str(&urlencoding::encode(segment));
        value.push_str(SLUG_DELIMITER);
    }
    value
}

/// Split a `SLUG` header back into the file name and collection key.
pub fn parse_slug(value: &str) -> Option<(String, CollectionKey)> {
    let inner = value
        .strip_prefix(SLUG_DELIMITER)?
        .strip_suffix(SLUG_DELIMITER)?;
    let segments = inner
        .split(SLUG_DELIMITER)
        .map(|segment| urlencoding::decode(segment).ok().map(|s| s.into_owned()))
        .collect::<Option<Vec<_>>>()?;

    match <[String; 4]>::try_from(segments) {
        Ok([file_name, object_type, object_id, document_type]) => Some((
            file_name,
            CollectionKey::new(object_type, object_id, document_type),
        )),
        Err(_) => None,
    }
}

/// Content type the transport must send instead of its guess, if any.
pub fn content_type_override(file_name: &str) -> Option<&'static str> {
    file_name.ends_with("msg").then_some(OUTLOOK_MIME)
}
