//! XML documents exchanged with the map API: the changeset-create body, the
//! osmChange upload body, and entity ids pulled out of a map response.

use super::error::RemoteError;
use crate::models::{EditAction, EditOperation, Element, EntityBatch, EntityType, Tag};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};

const GENERATOR: &str = "redaction-bot";

/// Creator metadata declared when opening a changeset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesetMetadata {
    pub tags: Vec<Tag>,
}

impl Default for ChangesetMetadata {
    fn default() -> Self {
        Self {
            tags: vec![
                ("created_by".to_string(), "Redaction bot".to_string()),
                ("bot".to_string(), "yes".to_string()),
                (
                    "comment".to_string(),
                    "Updates based on the redaction process".to_string(),
                ),
            ],
        }
    }
}

type XmlWriter = Writer<Vec<u8>>;

fn write(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), RemoteError> {
    writer
        .write_event(event)
        .map_err(|e| RemoteError::payload(e.to_string()))
}

fn into_string(writer: XmlWriter) -> Result<String, RemoteError> {
    String::from_utf8(writer.into_inner()).map_err(|e| RemoteError::payload(e.to_string()))
}

fn write_tags(writer: &mut XmlWriter, tags: &[Tag]) -> Result<(), RemoteError> {
    for (k, v) in tags {
        write(
            writer,
            Event::Empty(BytesStart::new("tag").with_attributes([("k", k.as_str()), ("v", v.as_str())])),
        )?;
    }
    Ok(())
}

/// `<osm><changeset><tag .../>...</changeset></osm>`
pub fn render_changeset_create(metadata: &ChangesetMetadata) -> Result<String, RemoteError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write(&mut writer, Event::Start(BytesStart::new("osm")))?;
    write(&mut writer, Event::Start(BytesStart::new("changeset")))?;
    write_tags(&mut writer, &metadata.tags)?;
    write(&mut writer, Event::End(BytesEnd::new("changeset")))?;
    write(&mut writer, Event::End(BytesEnd::new("osm")))?;
    into_string(writer)
}

/// Render one chunk as an osmChange document. Consecutive operations with the
/// same action share a block, so the document keeps the chunk's order.
pub fn render_osm_change(
    changeset_id: i64,
    operations: &[EditOperation],
) -> Result<String, RemoteError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write(
        &mut writer,
        Event::Start(
            BytesStart::new("osmChange").with_attributes([("version", "0.6"), ("generator", GENERATOR)]),
        ),
    )?;

    let changeset = changeset_id.to_string();
    let mut open_block: Option<(EditAction, bool)> = None;

    for operation in operations {
        let block = (operation.action, operation.action == EditAction::Delete && operation.if_unused);
        if open_block != Some(block) {
            if let Some((action, _)) = open_block {
                write(&mut writer, Event::End(BytesEnd::new(action.as_str())))?;
            }
            let mut start = BytesStart::new(block.0.as_str());
            if block.1 {
                start.push_attribute(("if-unused", "true"));
            }
            write(&mut writer, Event::Start(start))?;
            open_block = Some(block);
        }
        write_element(&mut writer, &operation.element, &changeset)?;
    }

    if let Some((action, _)) = open_block {
        write(&mut writer, Event::End(BytesEnd::new(action.as_str())))?;
    }
    write(&mut writer, Event::End(BytesEnd::new("osmChange")))?;
    into_string(writer)
}

fn write_element(writer: &mut XmlWriter, element: &Element, changeset: &str) -> Result<(), RemoteError> {
    let name = element.entity_type().as_str();
    let id = element.id().to_string();
    let version = element.version().to_string();
    let mut start = BytesStart::new(name).with_attributes([
        ("id", id.as_str()),
        ("version", version.as_str()),
        ("changeset", changeset),
    ]);

    match element {
        Element::Node { lat, lon, tags, .. } => {
            let lat = lat.to_string();
            let lon = lon.to_string();
            start.push_attribute(("lat", lat.as_str()));
            start.push_attribute(("lon", lon.as_str()));
            if tags.is_empty() {
                return write(writer, Event::Empty(start));
            }
            write(writer, Event::Start(start))?;
            write_tags(writer, tags)?;
        }
        Element::Way { nodes, tags, .. } => {
            write(writer, Event::Start(start))?;
            for node in nodes {
                let node_ref = node.to_string();
                write(
                    writer,
                    Event::Empty(BytesStart::new("nd").with_attributes([("ref", node_ref.as_str())])),
                )?;
            }
            write_tags(writer, tags)?;
        }
        Element::Relation { members, tags, .. } => {
            write(writer, Event::Start(start))?;
            for member in members {
                let member_ref = member.member_ref.to_string();
                write(
                    writer,
                    Event::Empty(BytesStart::new("member").with_attributes([
                        ("type", member.member_type.as_str()),
                        ("ref", member_ref.as_str()),
                        ("role", member.role.as_str()),
                    ])),
                )?;
            }
            write_tags(writer, tags)?;
        }
    }

    write(writer, Event::End(BytesEnd::new(name)))
}

/// Every top-level node/way/relation id in a map response, in document order.
pub fn parse_map_entities(xml: &str) -> Result<EntityBatch, String> {
    let mut reader = Reader::from_str(xml);
    let mut batch = EntityBatch::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let entity_type = match e.name().as_ref() {
                    b"node" => EntityType::Node,
                    b"way" => EntityType::Way,
                    b"relation" => EntityType::Relation,
                    _ => continue,
                };
                let attr = e
                    .try_get_attribute("id")
                    .map_err(|err| err.to_string())?
                    .ok_or_else(|| format!("{entity_type} without id"))?;
                let raw = std::str::from_utf8(&attr.value).map_err(|err| err.to_string())?;
                let id = raw
                    .parse::<i64>()
                    .map_err(|err| format!("bad {entity_type} id '{raw}': {err}"))?;
                batch.ids_mut(entity_type).push(id);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                ))
            }
        }
    }

    Ok(batch)
}
