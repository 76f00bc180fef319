use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fortbridge_runtime::ffi::{resolve, ElemType, RawArrayDescriptor};
use fortbridge_runtime::{BaseType, FortValue, Marshaller, VariableDescriptor};
use ndarray::{ArrayD, IxDyn};
use std::ffi::c_void;

fn bench_scalar_roundtrip(c: &mut Criterion) {
    let desc = VariableDescriptor::scalar("x", "__m_MOD_x", BaseType::Real, 8);
    c.bench_function("scalar_real8_roundtrip", |b| {
        let mut m = Marshaller::select(&desc).unwrap();
        b.iter(|| {
            m.to_native(Some(&FortValue::Real(black_box(1.25)))).unwrap();
            black_box(m.from_native().unwrap());
        });
    });
}

fn bench_explicit_array(c: &mut Criterion) {
    let desc =
        VariableDescriptor::explicit_array("a", "__m_MOD_a", BaseType::Real, 8, &[100, 100]);
    let value = FortValue::from(ArrayD::from_shape_vec(IxDyn(&[100, 100]), vec![1.0f64; 10_000]).unwrap());
    c.bench_function("explicit_array_10k_to_native", |b| {
        let mut m = Marshaller::select(&desc).unwrap();
        b.iter(|| m.to_native(Some(black_box(&value))).unwrap());
    });
}

fn bench_descriptor_build(c: &mut Criterion) {
    let layout = resolve(BaseType::Real, 8).unwrap();
    let mut payload = vec![0f64; 24];
    c.bench_function("descriptor_build_rank3", |b| {
        b.iter(|| {
            black_box(
                RawArrayDescriptor::build(
                    &layout,
                    ElemType::Real,
                    black_box(&[2, 3, 4]),
                    payload.as_mut_ptr() as *mut c_void,
                )
                .unwrap(),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_scalar_roundtrip,
    bench_explicit_array,
    bench_descriptor_build
);
criterion_main!(benches);
