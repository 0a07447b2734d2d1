use std::hint::black_box;

use bencher::RequestFixture;
use cio_http::codec::parse_request;
use cio_http::pools::{HttpPools, PoolConfig};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures::executor::block_on;

static SMALL_HEADER: RequestFixture =
    RequestFixture::new("small_header_decoder", "get_small.txt", include_str!("../resources/request/get_small.txt"));
static LARGE_HEADER: RequestFixture =
    RequestFixture::new("large_header_decoder", "get_large.txt", include_str!("../resources/request/get_large.txt"));

const PIPELINE_DEPTH: usize = 8;

fn pools() -> HttpPools {
    HttpPools::new(&PoolConfig::default()).expect("default pool configuration should be valid")
}

fn benchmark_request_decoder(criterion: &mut Criterion) {
    let pools = pools();
    let mut group = criterion.benchmark_group("request_decoder");

    for fixture in [SMALL_HEADER, LARGE_HEADER] {
        group.throughput(Throughput::Bytes(fixture.bytes().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fixture.name()), &fixture, |b, fixture| {
            b.iter(|| {
                let mut input = fixture.bytes();
                let request = block_on(parse_request(&mut input, &pools))
                    .expect("input should be a valid http request head")
                    .expect("input should hold one request");
                assert_eq!(request.headers().len(), fixture.header_count(), "{}", fixture.file_name());
                black_box(request);
            });
        });
    }

    group.finish();
}

fn benchmark_pipelined_decoder(criterion: &mut Criterion) {
    let pools = pools();
    let mut group = criterion.benchmark_group("pipelined_decoder");

    for fixture in [SMALL_HEADER, LARGE_HEADER] {
        let input = fixture.pipelined(PIPELINE_DEPTH);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fixture.name()), &input, |b, input| {
            b.iter(|| {
                let mut input = input.as_slice();
                let mut parsed = 0;
                while let Some(request) = block_on(parse_request(&mut input, &pools)).expect("input should be valid http request heads") {
                    parsed += 1;
                    black_box(request);
                }
                assert_eq!(parsed, PIPELINE_DEPTH);
            });
        });
    }

    group.finish();
}

criterion_group!(decoder, benchmark_request_decoder, benchmark_pipelined_decoder);
criterion_main!(decoder);
