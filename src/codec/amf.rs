//! AMF (Additive Manufacturing File Format) encoder.
//!
//! Uncompressed XML: one `<object>` whose `<mesh>` holds a vertex list and a
//! single `<volume>` of triangles.

use super::{ensure_encodable, CodecError, CodecResult};
use crate::mesh::Mesh;
use crate::units::LengthUnit;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

pub fn encode<W: Write>(mesh: &Mesh, writer: W, name: &str, unit: LengthUnit) -> CodecResult<()> {
    ensure_encodable(mesh)?;

    let mut xml = Writer::new_with_indent(writer, b' ', 2);

    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(CodecError::writer)?;

    let mut amf = BytesStart::new("amf");
    amf.push_attribute(("unit", unit.xml_name()));
    amf.push_attribute(("version", "1.1"));
    start(&mut xml, amf)?;

    let mut object = BytesStart::new("object");
    object.push_attribute(("id", "0"));
    start(&mut xml, object)?;
    if !name.is_empty() {
        let mut metadata = BytesStart::new("metadata");
        metadata.push_attribute(("type", "name"));
        start(&mut xml, metadata)?;
        text(&mut xml, name)?;
        end(&mut xml, "metadata")?;
    }

    start(&mut xml, BytesStart::new("mesh"))?;

    start(&mut xml, BytesStart::new("vertices"))?;
    for [x, y, z] in &mesh.vertices {
        start(&mut xml, BytesStart::new("vertex"))?;
        start(&mut xml, BytesStart::new("coordinates"))?;
        leaf(&mut xml, "x", &format!("{x}"))?;
        leaf(&mut xml, "y", &format!("{y}"))?;
        leaf(&mut xml, "z", &format!("{z}"))?;
        end(&mut xml, "coordinates")?;
        end(&mut xml, "vertex")?;
    }
    end(&mut xml, "vertices")?;

    start(&mut xml, BytesStart::new("volume"))?;
    for [v1, v2, v3] in &mesh.faces {
        start(&mut xml, BytesStart::new("triangle"))?;
        leaf(&mut xml, "v1", &v1.to_string())?;
        leaf(&mut xml, "v2", &v2.to_string())?;
        leaf(&mut xml, "v3", &v3.to_string())?;
        end(&mut xml, "triangle")?;
    }
    end(&mut xml, "volume")?;

    end(&mut xml, "mesh")?;
    end(&mut xml, "object")?;
    end(&mut xml, "amf")?;

    xml.into_inner().flush()?;
    Ok(())
}

fn start<W: Write>(xml: &mut Writer<W>, element: BytesStart<'_>) -> CodecResult<()> {
    xml.write_event(Event::Start(element))
        .map_err(CodecError::writer)
}

fn end<W: Write>(xml: &mut Writer<W>, name: &str) -> CodecResult<()> {
    xml.write_event(Event::End(BytesEnd::new(name)))
        .map_err(CodecError::writer)
}

fn text<W: Write>(xml: &mut Writer<W>, value: &str) -> CodecResult<()> {
    xml.write_event(Event::Text(BytesText::new(value)))
        .map_err(CodecError::writer)
}

fn leaf<W: Write>(xml: &mut Writer<W>, name: &str, value: &str) -> CodecResult<()> {
    start(xml, BytesStart::new(name))?;
    text(xml, value)?;
    end(xml, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::cuboid;

    #[test]
    fn writes_vertices_and_triangles() {
        let mut buf = Vec::new();
        encode(&cuboid([0.0; 3], [10.0; 3]), &mut buf, "cube", LengthUnit::Millimeter).unwrap();
        let xml = String::from_utf8(buf).unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"<amf unit="millimeter" version="1.1">"#));
        assert!(xml.contains("cube"));
        assert_eq!(xml.matches("<vertex>").count(), 8);
        assert_eq!(xml.matches("<triangle>").count(), 12);
    }

    #[test]
    fn name_is_escaped() {
        let mut buf = Vec::new();
        encode(&cuboid([0.0; 3], [1.0; 3]), &mut buf, "a<b", LengthUnit::Meter).unwrap();
        let xml = String::from_utf8(buf).unwrap();
        assert!(xml.contains("a&lt;b"));
        assert!(xml.contains(r#"unit="meter""#));
    }

    #[test]
    fn sub_micron_coordinates_survive_in_metres() {
        let mut buf = Vec::new();
        let mesh = cuboid([0.0; 3], [2.5e-7, 0.0123456789, 1.0]);
        encode(&mesh, &mut buf, "", LengthUnit::Meter).unwrap();
        let xml = String::from_utf8(buf).unwrap();
        assert!(xml.contains("<x>0.00000025</x>"), "{xml}");
        assert!(xml.contains("<y>0.0123456789</y>"), "{xml}");
    }
}
