use criterion::{
    Criterion, //
    criterion_group,
    criterion_main,
};
use iso8583_forge_helpers::*;
use std::hint::black_box;

fn benchmark_writing_bcd(c: &mut Criterion) {
    let mut group = c.benchmark_group("writing_bcd");
    let mut buf = [0u8; 32];

    group.bench_function("encode_bcd_pan", |b| {
        b.iter(|| encode_bcd(black_box("4539681234567890")))
    });

    group.bench_function("write_bcd_odd", |b| {
        b.iter(|| write_bcd(black_box(&mut buf), 0, black_box("123")))
    });

    group.bench_function("write_bcd_u64_amount", |b| {
        b.iter(|| write_bcd_u64(black_box(&mut buf), 0, black_box(1000), 12))
    });

    group.bench_function("write_bcd_u64_max", |b| {
        b.iter(|| {
            write_bcd_u64(
                black_box(&mut buf),
                0,
                black_box(u64::MAX),
                20,
            )
        })
    });

    group.finish();
}

fn benchmark_writing_fields(c: &mut Criterion) {
    let mut group = c.benchmark_group("writing_fields");

    let pan: FieldDescriptor = describe_variable(2, 19)
        .unwrap()
        .into();
    let amount: FieldDescriptor = describe_fixed(12).into();
    let terminal: FieldDescriptor = FixedField::new(8, ContentType::Special).into();

    group.bench_function("encode_field_llvar_pan", |b| {
        b.iter(|| encode_field(&pan, black_box("4539681234567890")))
    });

    group.bench_function("append_field_fixed_amount", |b| {
        let mut out = Vec::with_capacity(16);
        b.iter(|| {
            out.clear();
            append_field(&mut out, &amount, black_box("1000"))
        })
    });

    group.bench_function("encode_field_fixed_terminal_id", |b| {
        b.iter(|| encode_field(&terminal, black_box("TERM01")))
    });

    group.bench_function("bitmap_from_fields_extended", |b| {
        b.iter(|| BitmapIndex::from_fields(black_box([2u8, 4, 7, 11, 70])))
    });

    group.finish();
}

fn benchmark_special_functions(c: &mut Criterion) {
    let mut group = c.benchmark_group("special_functions");
    let mut buf = [0u8; 16];

    group.bench_function("write_transmission_datetime", |b| {
        b.iter(|| write_transmission_datetime(black_box(&mut buf), 0))
    });

    group.bench_function("format_transmission_datetime_from_timespec", |b| {
        let ts = libc::timespec {
            tv_sec: 1_700_000_000,
            tv_nsec: 0,
        };
        b.iter(|| format_transmission_datetime_from_timespec(black_box(&mut buf), 0, &ts))
    });

    group.bench_function("write_stan", |b| {
        b.iter(|| write_stan(black_box(&mut buf), 0))
    });

    group.finish();
}

fn benchmark_writing_messages(c: &mut Criterion) {
    let mut group = c.benchmark_group("writing_messages");
    let spec = MessageSpec::iso8583_numeric();

    let message = Message::new(Mti::new("0200").unwrap())
        .with(2, "4539681234567890")
        .unwrap()
        .with(4, "000000001000")
        .unwrap()
        .with(11, "123456")
        .unwrap();

    group.bench_function("encode_message_financial", |b| {
        b.iter(|| encode_message(&spec, black_box(&message)))
    });

    group.bench_function("encode_message_framed", |b| {
        b.iter(|| {
            let body = encode_message(&spec, black_box(&message)).unwrap();
            frame(&body)
        })
    });

    group.bench_function("forge_buffer_network_echo", |b| {
        b.iter(|| {
            let mut buffer = forge_out_buffer();
            let mut pos = FORGE_WRITE_START;

            black_box(&mut buffer)[pos..pos + 2].copy_from_slice(&[0x08, 0x00]);
            pos += 2;
            // Bitmap: DE 7, DE 11
            black_box(&mut buffer)[pos..pos + 8].copy_from_slice(&[0x02, 0x20, 0, 0, 0, 0, 0, 0]);
            pos += 8;
            pos += write_transmission_datetime(black_box(&mut buffer), pos).unwrap();
            pos += write_stan(black_box(&mut buffer), pos).unwrap();

            update_wire_length(black_box(&mut buffer), pos).unwrap();
            black_box(buffer)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_writing_bcd,
    benchmark_writing_fields,
    benchmark_special_functions,
    benchmark_writing_messages
);
criterion_main!(benches);
