//! End-to-end round-trip scenarios for the Partition codec.

use ebxkit_common::{hash, BinaryWriter, EbxGuid};
use ebxkit_ebx::schema::{SchemaBuilder, SchemaRegistry};
use ebxkit_ebx::structs::EbxImportReference;
use ebxkit_ebx::types::TypeKind;
use ebxkit_ebx::{
    BoxedValue, EbxAsset, Object, PartitionReader, PartitionWriter, PointerRef, TypeRefValue,
    Value,
};

fn guid(n: u8) -> EbxGuid {
    let mut bytes = [0u8; 16];
    bytes[0] = n;
    bytes[15] = n;
    EbxGuid::from_bytes(bytes)
}

fn instance(schema: &SchemaRegistry, type_name: &str) -> Object {
    let hash = schema.type_by_name(type_name).unwrap().name_hash;
    schema.new_instance(hash).unwrap()
}

fn roundtrip(asset: &EbxAsset, schema: &SchemaRegistry, version: u32) -> (Vec<u8>, EbxAsset) {
    let bytes = PartitionWriter::new(schema, version)
        .unwrap()
        .write_asset(asset)
        .unwrap();
    let reloaded = PartitionReader::new(&bytes, schema)
        .unwrap()
        .read_asset()
        .unwrap();
    (bytes, reloaded)
}

fn header_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

/// Scenario 1: a single exported instance of a fieldless type, version 2.
#[test]
fn empty_asset_v2() {
    let mut sb = SchemaBuilder::new();
    sb.class("Thing");
    let schema = sb.build();

    let mut asset = EbxAsset::new(guid(1));
    asset.add_exported_object(guid(9), instance(&schema, "Thing"));

    let (bytes, reloaded) = roundtrip(&asset, &schema, 2);

    assert_eq!(header_u32(&bytes, 0), 2);
    assert_eq!(reloaded.objects().len(), 1);
    assert_eq!(reloaded.exported_count(), 1);
    assert_eq!(reloaded.objects()[0].class_guid.guid, guid(9));
    assert_eq!(reloaded.ref_counts(), &[0]);
    assert!(reloaded.imports().is_empty());
    assert_eq!(reloaded.file_guid(), guid(1));
}

/// Scenario 1, from a hand-assembled payload following the header grammar.
#[test]
fn empty_asset_v2_literal_payload() {
    let mut sb = SchemaBuilder::new();
    sb.class("Thing");
    let schema = sb.build();
    let type_hash = hash::hash_str("Thing");

    let mut w = BinaryWriter::new();
    w.write_u32(2); // magic
    w.write_u32(112); // stringsOffset
    w.write_u32(16); // stringsAndDataLen
    w.write_u32(0); // importCount
    w.write_u16(1); // instanceCount
    w.write_u16(1); // exportedCount
    w.write_u16(1); // uniqueTypeCount
    w.write_u16(1); // typeDescriptorCount
    w.write_u16(0); // fieldDescriptorCount
    w.write_u16(6); // typeNamesLen
    w.write_u32(0); // stringsLen
    w.write_u32(0); // arrayCount
    w.write_u32(16); // dataLen
    w.write_guid(guid(1)); // fileGuid
    w.write_bytes(&[0u8; 16]); // v2 padding
    assert_eq!(w.position(), 72);

    w.write_cstring("Thing"); // type names region
    // type descriptor: fieldless, alignment 4, size 8
    w.write_u32(type_hash);
    w.write_i32(0);
    w.write_u8(0);
    w.write_u8(4);
    w.write_u16((TypeKind::Class as u16) << 4);
    w.write_u16(8);
    w.write_u16(8);
    // instance table: one instance of type 0
    w.write_u16(0);
    w.write_u16(1);
    assert_eq!(w.position(), 98);

    // instance region at stringsOffset + stringsLen = 112; a fieldless
    // 4-aligned type is just its exported GUID on the wire.
    w.seek(112);
    w.write_guid(guid(9));

    let bytes = w.into_inner();
    let asset = PartitionReader::new(&bytes, &schema)
        .unwrap()
        .read_asset()
        .unwrap();

    assert_eq!(asset.objects().len(), 1);
    assert_eq!(asset.objects()[0].type_hash, type_hash);
    assert_eq!(asset.objects()[0].class_guid.guid, guid(9));
    assert_eq!(asset.ref_counts(), &[0]);
}

/// Scenario 2: an inheritance chain round-trips, and the derived type's own
/// field sits right after the base footprint.
#[test]
fn inheritance_chain() {
    let mut sb = SchemaBuilder::new();
    let base = sb.class("Base");
    sb.field(base, "a", TypeKind::UInt32);
    let child = sb.class_with_base("Child", base);
    sb.field(child, "b", TypeKind::Float32);
    let schema = sb.build();

    let base_size = schema.type_by_name("Base").unwrap().size;
    let child_ts = schema.type_by_name("Child").unwrap();
    assert_eq!(child_ts.fields[1].offset, base_size as u32);

    let mut obj = instance(&schema, "Child");
    obj.set("a", Value::UInt32(0xDEAD_BEEF));
    obj.set("b", Value::Float32(1.5));

    let mut asset = EbxAsset::new(guid(1));
    asset.add_exported_object(guid(2), obj);

    let (_, reloaded) = roundtrip(&asset, &schema, 2);
    let obj = &reloaded.objects()[0];
    assert_eq!(obj.get("a"), Some(&Value::UInt32(0xDEAD_BEEF)));
    assert_eq!(obj.get("b"), Some(&Value::Float32(1.5)));
}

/// Scenario 3: an array of three {u16, u16} structs.
#[test]
fn array_of_structs() {
    let mut sb = SchemaBuilder::new();
    let pair = sb.value_type("Pair");
    sb.field(pair, "x", TypeKind::UInt16);
    sb.field(pair, "y", TypeKind::UInt16);
    let holder = sb.class("Holder");
    sb.array_field(holder, "points", TypeKind::Struct, Some("Pair"));
    let schema = sb.build();

    let make_pair = |x: u16, y: u16| {
        let mut p = instance(&schema, "Pair");
        p.set("x", Value::UInt16(x));
        p.set("y", Value::UInt16(y));
        Value::Struct(p)
    };

    let mut obj = instance(&schema, "Holder");
    obj.set(
        "points",
        Value::Array(vec![make_pair(1, 2), make_pair(3, 4), make_pair(5, 6)]),
    );

    let mut asset = EbxAsset::new(guid(1));
    asset.add_exported_object(guid(2), obj.clone());

    let (_, reloaded) = roundtrip(&asset, &schema, 2);
    let points = reloaded.objects()[0].get("points").unwrap().as_array().unwrap();

    assert_eq!(points.len(), 3);
    for (pair, (x, y)) in points.iter().zip([(1u16, 2u16), (3, 4), (5, 6)]) {
        let p = pair.as_struct().unwrap();
        assert_eq!(p.get("x"), Some(&Value::UInt16(x)));
        assert_eq!(p.get("y"), Some(&Value::UInt16(y)));
    }
}

/// Scenario 4: an internal pointer cycle terminates the pre-pass and
/// round-trips with both ref counts at one.
#[test]
fn internal_pointer_cycle() {
    let mut sb = SchemaBuilder::new();
    let node = sb.class("Node");
    sb.pointer_field(node, "next", Some("Node"));
    let schema = sb.build();

    let mut x = instance(&schema, "Node");
    let mut y = instance(&schema, "Node");
    x.set("next", Value::Pointer(PointerRef::Internal(1)));
    y.set("next", Value::Pointer(PointerRef::Internal(0)));

    let mut asset = EbxAsset::new(guid(1));
    asset.add_exported_object(guid(2), x);
    asset.add_exported_object(guid(3), y);

    let (_, reloaded) = roundtrip(&asset, &schema, 2);

    assert_eq!(
        reloaded.objects()[0].get("next"),
        Some(&Value::Pointer(PointerRef::Internal(1)))
    );
    assert_eq!(
        reloaded.objects()[1].get("next"),
        Some(&Value::Pointer(PointerRef::Internal(0)))
    );
    assert_eq!(reloaded.ref_counts(), &[1, 1]);
}

/// Scenario 5: an external pointer lands in the import table and the
/// dependency set.
#[test]
fn external_import() {
    let mut sb = SchemaBuilder::new();
    let node = sb.class("Node");
    sb.pointer_field(node, "next", None);
    let schema = sb.build();

    let import = EbxImportReference {
        file_guid: guid(7),
        class_guid: guid(8),
    };

    let mut x = instance(&schema, "Node");
    x.set("next", Value::Pointer(PointerRef::External(import)));

    let mut asset = EbxAsset::new(guid(1));
    asset.add_exported_object(guid(2), x);

    let (_, reloaded) = roundtrip(&asset, &schema, 2);

    assert_eq!(reloaded.imports(), &[import]);
    assert_eq!(reloaded.dependencies(), &[guid(7)]);
    assert_eq!(
        reloaded.objects()[0].get("next"),
        Some(&Value::Pointer(PointerRef::External(import)))
    );
}

/// Scenario 6: a boxed enum value (requires version 4).
#[test]
fn boxed_enum() {
    let mut sb = SchemaBuilder::new();
    sb.enumeration("E", &["Zero", "One", "Two"]);
    let holder = sb.class("Holder");
    sb.field(holder, "payload", TypeKind::BoxedValueRef);
    let schema = sb.build();

    let enum_hash = schema.type_by_name("E").unwrap().name_hash;

    let mut obj = instance(&schema, "Holder");
    obj.set(
        "payload",
        Value::BoxedValue(Some(Box::new(BoxedValue {
            kind: TypeKind::Enum,
            type_hash: enum_hash,
            value: Value::Enum(7),
        }))),
    );

    let mut asset = EbxAsset::new(guid(1));
    asset.add_exported_object(guid(2), obj);

    let (bytes, reloaded) = roundtrip(&asset, &schema, 4);
    assert_eq!(header_u32(&bytes, 0), 4);

    match reloaded.objects()[0].get("payload") {
        Some(Value::BoxedValue(Some(boxed))) => {
            assert_eq!(boxed.kind, TypeKind::Enum);
            assert_eq!(boxed.type_hash, enum_hash);
            assert_eq!(boxed.value, Value::Enum(7));
        }
        other => panic!("unexpected payload: {:?}", other),
    }
}

/// Boxed values cannot be carried by version 2 payloads.
#[test]
fn boxed_values_rejected_on_v2() {
    let mut sb = SchemaBuilder::new();
    let holder = sb.class("Holder");
    sb.field(holder, "payload", TypeKind::BoxedValueRef);
    let schema = sb.build();

    let mut obj = instance(&schema, "Holder");
    obj.set(
        "payload",
        Value::BoxedValue(Some(Box::new(BoxedValue {
            kind: TypeKind::Int32,
            type_hash: 0,
            value: Value::Int32(5),
        }))),
    );

    let mut asset = EbxAsset::new(guid(1));
    asset.add_exported_object(guid(2), obj);

    let writer = PartitionWriter::new(&schema, 2).unwrap();
    assert!(writer.write_asset(&asset).is_err());
}

fn kitchen_sink_schema() -> SchemaRegistry {
    let mut sb = SchemaBuilder::new();
    let vec2 = sb.value_type("Vec2");
    sb.field(vec2, "x", TypeKind::Float32);
    sb.field(vec2, "y", TypeKind::Float32);
    sb.enumeration("Mode", &["Off", "On"]);
    let entity = sb.class("Entity");
    sb.field(entity, "enabled", TypeKind::Boolean);
    sb.field(entity, "tiny", TypeKind::Int8);
    sb.field(entity, "level", TypeKind::UInt8);
    sb.field(entity, "delta", TypeKind::Int16);
    sb.field(entity, "port", TypeKind::UInt16);
    sb.field(entity, "seed", TypeKind::Int32);
    sb.field(entity, "mask", TypeKind::UInt32);
    sb.field(entity, "ticks", TypeKind::Int64);
    sb.field(entity, "span", TypeKind::UInt64);
    sb.field(entity, "ratio", TypeKind::Float32);
    sb.field(entity, "precise", TypeKind::Float64);
    sb.field(entity, "id", TypeKind::Guid);
    sb.field(entity, "digest", TypeKind::Sha1);
    sb.field(entity, "tag", TypeKind::String);
    sb.field(entity, "label", TypeKind::CString);
    sb.field(entity, "source", TypeKind::FileRef);
    sb.field(entity, "mesh", TypeKind::ResourceRef);
    sb.field(entity, "kindRef", TypeKind::TypeRef);
    sb.field(entity, "callback", TypeKind::Delegate);
    sb.enum_field(entity, "mode", "Mode");
    sb.struct_field(entity, "pos", "Vec2");
    sb.array_field(entity, "weights", TypeKind::Float32, None);
    sb.array_field(entity, "names", TypeKind::CString, None);
    sb.pointer_field(entity, "next", Some("Entity"));
    sb.build()
}

fn kitchen_sink_asset(schema: &SchemaRegistry) -> EbxAsset {
    let mut obj = instance(schema, "Entity");
    obj.set("enabled", Value::Bool(true));
    obj.set("tiny", Value::Int8(-7));
    obj.set("level", Value::UInt8(250));
    obj.set("delta", Value::Int16(-300));
    obj.set("port", Value::UInt16(8080));
    obj.set("seed", Value::Int32(-123456));
    obj.set("mask", Value::UInt32(0xFFEE_0011));
    obj.set("ticks", Value::Int64(-9_000_000_000));
    obj.set("span", Value::UInt64(18_000_000_000));
    obj.set("ratio", Value::Float32(0.25));
    obj.set("precise", Value::Float64(1.0 / 3.0));
    obj.set("id", Value::Guid(guid(0xAB)));
    obj.set("digest", Value::Sha1([0x5A; 20]));
    obj.set("tag", Value::String("fixed".into()));
    obj.set("label", Value::CString("shared".into()));
    obj.set("source", Value::FileRef("levels/intro".into()));
    obj.set("mesh", Value::ResourceRef(0x0123_4567_89AB_CDEF));
    obj.set("kindRef", Value::TypeRef(TypeRefValue::Guid(guid(0xCD))));
    obj.set("callback", Value::Delegate(TypeRefValue::Name("OnSpawn".into())));
    obj.set("mode", Value::Enum(1));
    let mut pos = instance(schema, "Vec2");
    pos.set("x", Value::Float32(3.5));
    pos.set("y", Value::Float32(-2.25));
    obj.set("pos", Value::Struct(pos));
    obj.set(
        "weights",
        Value::Array(vec![
            Value::Float32(0.1),
            Value::Float32(0.5),
            Value::Float32(0.9),
        ]),
    );
    obj.set(
        "names",
        Value::Array(vec![
            Value::CString("shared".into()),
            Value::CString("other".into()),
        ]),
    );
    obj.set("next", Value::Pointer(PointerRef::Internal(1)));

    let mut tail = instance(schema, "Entity");
    tail.set("label", Value::CString("shared".into()));

    let mut asset = EbxAsset::new(guid(1));
    asset.add_exported_object(guid(2), obj);
    asset.add_object(tail);
    asset
}

/// Semantic round-trip: every field kind survives write-then-read, and the
/// exported/non-exported partition is preserved.
#[test]
fn kitchen_sink_roundtrip() {
    let schema = kitchen_sink_schema();
    let asset = kitchen_sink_asset(&schema);

    let (_, reloaded) = roundtrip(&asset, &schema, 2);

    assert_eq!(reloaded.objects().len(), 2);
    assert_eq!(reloaded.exported_count(), 1);
    assert!(!reloaded.objects()[1].class_guid.is_exported());

    let original = &asset.objects()[0];
    let decoded = &reloaded.objects()[0];
    for field in original.iter() {
        assert_eq!(
            decoded.get_hash(field.name_hash),
            Some(&field.value),
            "field {:#010x} did not round-trip",
            field.name_hash
        );
    }
    assert_eq!(reloaded.ref_counts(), &[0, 1]);
}

/// Determinism: two writes of the same graph are byte-identical.
#[test]
fn writes_are_deterministic() {
    let schema = kitchen_sink_schema();
    let asset = kitchen_sink_asset(&schema);

    let writer = PartitionWriter::new(&schema, 2).unwrap();
    let first = writer.write_asset(&asset).unwrap();
    let second = writer.write_asset(&asset).unwrap();
    assert_eq!(first, second);
}

/// Idempotence: read∘write∘read yields the same bytes and graph.
#[test]
fn rewrite_is_idempotent() {
    let schema = kitchen_sink_schema();
    let asset = kitchen_sink_asset(&schema);

    let (first, reloaded) = roundtrip(&asset, &schema, 2);
    let (second, again) = roundtrip(&reloaded, &schema, 2);

    assert_eq!(first, second);
    assert_eq!(reloaded.objects(), again.objects());
    assert_eq!(reloaded.ref_counts(), again.ref_counts());
    assert_eq!(reloaded.imports(), again.imports());
}

/// Region boundaries sit on 16-byte alignment.
#[test]
fn regions_are_aligned() {
    let schema = kitchen_sink_schema();
    let asset = kitchen_sink_asset(&schema);
    let (bytes, _) = roundtrip(&asset, &schema, 2);

    let strings_offset = header_u32(&bytes, 4) as usize;
    let strings_len = header_u32(&bytes, 28) as usize;
    let data_len = header_u32(&bytes, 36) as usize;

    assert_eq!(strings_offset % 16, 0);
    assert_eq!((strings_offset + strings_len) % 16, 0);
    assert_eq!((strings_offset + strings_len + data_len) % 16, 0);
}

/// The string pool holds each interned string exactly once.
#[test]
fn string_pool_has_no_duplicates() {
    let schema = kitchen_sink_schema();
    let asset = kitchen_sink_asset(&schema);
    let (bytes, _) = roundtrip(&asset, &schema, 2);

    let strings_offset = header_u32(&bytes, 4) as usize;
    let strings_len = header_u32(&bytes, 28) as usize;
    let pool = &bytes[strings_offset..strings_offset + strings_len];

    // "shared" appears in three properties but once in the pool.
    let needle = b"shared\0";
    let count = pool
        .windows(needle.len())
        .filter(|window| window == needle)
        .count();
    assert_eq!(count, 1);
}

/// A payload with an unknown magic value is rejected before any decoding.
#[test]
fn bad_magic_is_rejected() {
    let schema = SchemaRegistry::default();
    let bytes = 3u32.to_le_bytes();
    assert!(PartitionReader::new(&bytes, &schema).is_err());
}

/// The reader refuses instances whose type the schema does not know.
#[test]
fn unknown_type_is_schema_mismatch() {
    let mut sb = SchemaBuilder::new();
    sb.class("Thing");
    let schema = sb.build();

    let mut asset = EbxAsset::new(guid(1));
    asset.add_exported_object(guid(2), instance(&schema, "Thing"));
    let bytes = PartitionWriter::new(&schema, 2)
        .unwrap()
        .write_asset(&asset)
        .unwrap();

    // Read back against an empty schema.
    let empty = SchemaRegistry::default();
    assert!(PartitionReader::new(&bytes, &empty)
        .unwrap()
        .read_asset()
        .is_err());
}
