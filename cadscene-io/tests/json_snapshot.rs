use std::f64::consts::FRAC_PI_2;
use std::io::Write;
use std::path::Path;

use cadscene_core::document::{
    BlockDefinition, BlockHandle, Document, Entity, EntityKind, FontStyle, Line, Units,
};
use cadscene_core::geometry::{Point2, Point3};
use cadscene_io::{DocumentLoader, DocumentSaver, IoError, JsonFacade};

fn sample_document() -> Document {
    let mut doc = Document::with_units(Units::Millimeters);
    doc.add_line(Point3::planar(0.0, 0.0), Point3::planar(10.0, 0.0));
    doc.add_polyline([Point2::new(0.0, 0.0), Point2::new(5.0, 5.0)], true);
    doc.add_arc(Point3::planar(0.0, 0.0), 2.0, 0.0, FRAC_PI_2);
    doc.add_mtext(Point3::planar(1.0, 1.0), r"{\C1;Hello}", 2.5, 0.0, 5);
    let handle = BlockHandle::new(42);
    doc.add_block(BlockDefinition::new(handle, "B42").with_entity(Entity::Line(Line {
        start: Point3::planar(0.0, 0.0),
        end: Point3::planar(1.0, 0.0),
    })));
    doc.add_block_reference(handle, Point3::planar(3.0, 4.0), 0.5);
    doc
}

#[test]
fn saved_snapshot_loads_back() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("drawing.json");
    let facade = JsonFacade::pretty();

    let original = sample_document();
    facade.save(&original, &path).expect("保存快照失败");
    let loaded = facade.load(&path).expect("读取快照失败");

    assert_eq!(loaded.units(), Units::Millimeters);
    assert_eq!(loaded.entity_count(), original.entity_count());
    let kinds: Vec<EntityKind> = loaded.entities().map(|(_, e)| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            EntityKind::Line,
            EntityKind::Polyline,
            EntityKind::Arc,
            EntityKind::MText,
            EntityKind::BlockReference,
        ]
    );
    let block = loaded.block(BlockHandle::new(42)).expect("块定义应存在");
    assert_eq!(block.name, "B42");
    assert_eq!(block.entities.len(), 1);
}

#[test]
fn optional_fields_take_defaults() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    write!(
        file,
        r#"{{
            "header": {{ "units": "Centimeters" }},
            "entities": [
                [0, {{ "MText": {{
                    "insert": [1.0, 2.0, 0.0],
                    "content": "A",
                    "height": 1.0,
                    "rotation": 0.0,
                    "attachment_point": 1
                }} }}],
                [1, {{ "Polyline": {{
                    "vertices": [{{ "position": [0.0, 0.0] }}, {{ "position": [1.0, 0.0] }}],
                    "is_closed": false
                }} }}]
            ],
            "next_entity_id": 2
        }}"#
    )
    .expect("write snapshot");

    let doc = JsonFacade::new().load(file.path()).expect("读取快照失败");
    assert_eq!(doc.units(), Units::Centimeters);
    match doc.entity_at(0) {
        Some(Entity::MText(mtext)) => assert_eq!(mtext.font_style, FontStyle::Regular),
        other => panic!("unexpected entity: {other:?}"),
    }
    match doc.entity_at(1) {
        Some(Entity::Polyline(polyline)) => {
            assert_eq!(polyline.vertices.len(), 2);
            assert!(polyline.vertices[1].bulge.abs() < 1e-12);
        }
        other => panic!("unexpected entity: {other:?}"),
    }
    assert_eq!(doc.blocks().count(), 0);
}

#[test]
fn errors_carry_the_offending_path() {
    let missing = Path::new("/definitely/not/here.json");
    match JsonFacade::new().load(missing) {
        Err(IoError::ReadError { path, .. }) => assert_eq!(path, missing),
        other => panic!("unexpected result: {other:?}"),
    }

    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    write!(file, "{{ not json").expect("write snapshot");
    match JsonFacade::new().load(file.path()) {
        Err(IoError::Decode { path, .. }) => assert_eq!(path, file.path()),
        other => panic!("unexpected result: {other:?}"),
    }
}
