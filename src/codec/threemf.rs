//! 3MF (3D Manufacturing Format) encoder.
//!
//! A 3MF file is a zip archive holding:
//!
//! ```text
//! [Content_Types].xml
//! _rels/.rels
//! 3D/3dmodel.model      single <object> with <vertices> and <triangles>
//! ```
//!
//! Watertightness is not enforced: printers and slicers decide what to do
//! with open shells.

use super::{ensure_encodable, CodecError, CodecResult};
use crate::mesh::Mesh;
use crate::units::LengthUnit;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::{Cursor, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const NAMESPACE_3MF: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
</Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

/// Encode as a 3MF archive. Needs `Seek` because zip writes a central
/// directory at the end.
pub fn encode<W: Write + Seek>(
    mesh: &Mesh,
    writer: W,
    name: &str,
    unit: LengthUnit,
) -> CodecResult<()> {
    ensure_encodable(mesh)?;

    let model_xml = model_xml(mesh, name, unit)?;

    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)
        .map_err(CodecError::writer)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

    zip.start_file("_rels/.rels", options)
        .map_err(CodecError::writer)?;
    zip.write_all(RELS_XML.as_bytes())?;

    zip.start_file("3D/3dmodel.model", options)
        .map_err(CodecError::writer)?;
    zip.write_all(model_xml.as_bytes())?;

    zip.finish().map_err(CodecError::writer)?;
    Ok(())
}

/// Build the `3D/3dmodel.model` document.
pub(crate) fn model_xml(mesh: &Mesh, name: &str, unit: LengthUnit) -> CodecResult<String> {
    let mut buffer = Vec::new();
    let mut xml = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);
    let mut emit = |event: Event<'_>| xml.write_event(event).map_err(CodecError::writer);

    emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut model = BytesStart::new("model");
    model.push_attribute(("xmlns", NAMESPACE_3MF));
    model.push_attribute(("unit", unit.xml_name()));
    model.push_attribute(("xml:lang", "en-US"));
    emit(Event::Start(model))?;
    emit(Event::Start(BytesStart::new("resources")))?;

    let mut object = BytesStart::new("object");
    object.push_attribute(("id", "1"));
    object.push_attribute(("type", "model"));
    if !name.is_empty() {
        object.push_attribute(("name", name));
    }
    emit(Event::Start(object))?;
    emit(Event::Start(BytesStart::new("mesh")))?;

    emit(Event::Start(BytesStart::new("vertices")))?;
    for [x, y, z] in &mesh.vertices {
        let mut vertex = BytesStart::new("vertex");
        vertex.push_attribute(("x", format!("{x}").as_str()));
        vertex.push_attribute(("y", format!("{y}").as_str()));
        vertex.push_attribute(("z", format!("{z}").as_str()));
        emit(Event::Empty(vertex))?;
    }
    emit(Event::End(BytesEnd::new("vertices")))?;

    emit(Event::Start(BytesStart::new("triangles")))?;
    for [v1, v2, v3] in &mesh.faces {
        let mut triangle = BytesStart::new("triangle");
        triangle.push_attribute(("v1", v1.to_string().as_str()));
        triangle.push_attribute(("v2", v2.to_string().as_str()));
        triangle.push_attribute(("v3", v3.to_string().as_str()));
        emit(Event::Empty(triangle))?;
    }
    emit(Event::End(BytesEnd::new("triangles")))?;

    emit(Event::End(BytesEnd::new("mesh")))?;
    emit(Event::End(BytesEnd::new("object")))?;
    emit(Event::End(BytesEnd::new("resources")))?;

    emit(Event::Start(BytesStart::new("build")))?;
    let mut item = BytesStart::new("item");
    item.push_attribute(("objectid", "1"));
    emit(Event::Empty(item))?;
    emit(Event::End(BytesEnd::new("build")))?;

    emit(Event::End(BytesEnd::new("model")))?;

    String::from_utf8(buffer)
        .map_err(|e| CodecError::invalid(format!("invalid UTF-8 in generated XML: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::cuboid;
    use std::io::Read;

    #[test]
    fn archive_contains_model_part() {
        let mut cursor = Cursor::new(Vec::new());
        encode(&cuboid([0.0; 3], [10.0; 3]), &mut cursor, "cube", LengthUnit::Millimeter).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        assert!(archive.by_name("[Content_Types].xml").is_ok());
        assert!(archive.by_name("_rels/.rels").is_ok());

        let mut model = String::new();
        archive
            .by_name("3D/3dmodel.model")
            .unwrap()
            .read_to_string(&mut model)
            .unwrap();
        assert!(model.contains(r#"unit="millimeter""#));
        assert!(model.contains(r#"name="cube""#));
        assert_eq!(model.matches("<vertex ").count(), 8);
        assert_eq!(model.matches("<triangle ").count(), 12);
    }

    #[test]
    fn model_unit_follows_configuration() {
        let xml = model_xml(&cuboid([0.0; 3], [1.0; 3]), "", LengthUnit::Inch).unwrap();
        assert!(xml.contains(r#"unit="inch""#));
        assert!(!xml.contains("name="));
    }

    #[test]
    fn sub_micron_coordinates_survive_in_metres() {
        let mesh = cuboid([0.0; 3], [2.5e-7, 0.0123456789, 1.0]);
        let xml = model_xml(&mesh, "", LengthUnit::Meter).unwrap();
        assert!(xml.contains(r#"x="0.00000025""#), "{xml}");
        assert!(xml.contains(r#"y="0.0123456789""#), "{xml}");
    }
}
