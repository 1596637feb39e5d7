use criterion::{
    Criterion, //
    criterion_group,
    criterion_main,
};
use iso8583_forge_helpers::*;
use std::hint::black_box;

const FULL_MESSAGE: [u8; 36] = [
    0x02, 0x00, 0xD0, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x16, 0x45, 0x39, 0x68, 0x12, 0x34, 0x56, 0x78, 0x90, 0x00, 0x00, 0x00, 0x00, 0x10,
    0x00, 0x12, 0x34, 0x56,
];

fn benchmark_reading_bcd(c: &mut Criterion) {
    let mut group = c.benchmark_group("reading_bcd");

    group.bench_function("decode_bcd_stan", |b| {
        b.iter(|| decode_bcd(black_box(&[0x12, 0x34, 0x56]), 6))
    });

    group.bench_function("decode_bcd_odd", |b| {
        b.iter(|| decode_bcd(black_box(&[0x01, 0x23]), 3))
    });

    group.bench_function("decode_bcd_pan_right_f", |b| {
        b.iter(|| {
            BcdCodec::RIGHT_F.decode(
                black_box(&[0x45, 0x39, 0x68, 0x12, 0x34, 0x56, 0x78, 0x90, 0x1F]),
                17,
            )
        })
    });

    group.bench_function("read_bcd_u64_amount", |b| {
        b.iter(|| read_bcd_u64(black_box(&[0x00, 0x00, 0x00, 0x00, 0x10, 0x00])))
    });

    group.finish();
}

fn benchmark_reading_bitmap(c: &mut Criterion) {
    let mut group = c.benchmark_group("reading_bitmap");

    group.bench_function("from_bytes_primary", |b| {
        b.iter(|| BitmapIndex::from_bytes(black_box(&FULL_MESSAGE[2..10])))
    });

    group.bench_function("set_bits_extended", |b| {
        let bitmap = BitmapIndex::from_bytes(&FULL_MESSAGE[2..18]).unwrap();
        b.iter(|| {
            black_box(&bitmap)
                .set_bits()
                .count()
        })
    });

    group.finish();
}

fn benchmark_reading_fields(c: &mut Criterion) {
    let mut group = c.benchmark_group("reading_fields");

    let pan: FieldDescriptor = describe_variable(2, 19)
        .unwrap()
        .into();
    let amount: FieldDescriptor = describe_fixed(12).into();

    group.bench_function("decode_field_llvar_pan", |b| {
        b.iter(|| decode_field(&pan, black_box(&FULL_MESSAGE), 18))
    });

    group.bench_function("decode_field_fixed_amount", |b| {
        b.iter(|| decode_field(&amount, black_box(&FULL_MESSAGE), 27))
    });

    group.finish();
}

fn benchmark_reading_messages(c: &mut Criterion) {
    let mut group = c.benchmark_group("reading_messages");
    let spec = MessageSpec::iso8583_numeric();

    group.bench_function("decode_message_canonical", |b| {
        b.iter(|| decode_message(&spec, black_box(&FULL_MESSAGE)))
    });

    group.bench_function("read_frame_then_decode", |b| {
        let framed = frame(&FULL_MESSAGE).unwrap();
        b.iter(|| {
            let (body, _) = read_frame(black_box(&framed)).unwrap();
            decode_message(&spec, body)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_reading_bcd,
    benchmark_reading_bitmap,
    benchmark_reading_fields,
    benchmark_reading_messages
);
criterion_main!(benches);
