// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for key migration.
//!
//! Measures hybrid key generation, sealing, and full batch runs at several
//! concurrency limits.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keymigrate::algorithm::AlgorithmSpec;
use keymigrate::compliance::CompliancePolicy;
use keymigrate::crypto::{CapabilityTable, CryptoProvider, SoftwareBackend};
use keymigrate::migration::{
    CancellationToken, MigrationConfig, MigrationJob, MigrationOrchestrator, ProofSigner,
};
use keymigrate::store::{KeyRecord, KeyRecordStore, MemoryKeyStore};
use tokio::runtime::Runtime;

fn bench_crypto(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let provider = CapabilityTable::software(SoftwareBackend::generate().unwrap());

    let mut group = c.benchmark_group("crypto");

    for spec in [
        AlgorithmSpec::rsa2048(),
        AlgorithmSpec::kyber768(),
        AlgorithmSpec::hybrid_kyber768(),
        AlgorithmSpec::hybrid_dilithium3(),
    ] {
        let name = spec.algorithm_type.as_str();

        group.bench_function(BenchmarkId::new("generate", name), |b| {
            b.to_async(&rt)
                .iter(|| async { black_box(provider.generate(&spec).await.unwrap()) })
        });

        let pair = rt.block_on(provider.generate(&spec)).unwrap();
        let sealed = rt.block_on(provider.encrypt(&spec, &pair.private)).unwrap();

        group.bench_function(BenchmarkId::new("seal", name), |b| {
            b.to_async(&rt)
                .iter(|| async { black_box(provider.encrypt(&spec, &pair.private).await.unwrap()) })
        });

        group.bench_function(BenchmarkId::new("open", name), |b| {
            b.to_async(&rt)
                .iter(|| async { black_box(provider.decrypt(&spec, &sealed).await.unwrap()) })
        });
    }

    group.finish();
}

fn seeded_store(rt: &Runtime, provider: &CapabilityTable, n: usize) -> Arc<MemoryKeyStore> {
    let store = Arc::new(MemoryKeyStore::new());
    let spec = AlgorithmSpec::rsa2048();
    rt.block_on(async {
        for i in 0..n {
            let pair = provider.generate(&spec).await.unwrap();
            let sealed = provider.encrypt(&spec, &pair.private).await.unwrap();
            store
                .insert(KeyRecord::new(
                    format!("key-{i:05}"),
                    pair.public.bytes,
                    sealed,
                    spec.clone(),
                ))
                .await
                .unwrap();
        }
    });
    store
}

fn bench_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let provider = Arc::new(CapabilityTable::software(SoftwareBackend::generate().unwrap()));
    const RECORDS: usize = 200;

    let mut group = c.benchmark_group("batch");
    group.throughput(Throughput::Elements(RECORDS as u64));
    group.sample_size(10);

    for concurrency in [1usize, 8, 32] {
        group.bench_with_input(
            BenchmarkId::new("rsa2048_to_hybrid_kyber768", concurrency),
            &concurrency,
            |b, &concurrency| {
                b.iter_batched(
                    || seeded_store(&rt, &provider, RECORDS),
                    |store| {
                        let orchestrator = MigrationOrchestrator::new(
                            store,
                            provider.clone(),
                            ProofSigner::generate().unwrap(),
                            MigrationConfig::default().with_concurrency_limit(concurrency),
                        )
                        .unwrap();
                        let job = MigrationJob::new(
                            AlgorithmSpec::rsa2048(),
                            AlgorithmSpec::hybrid_kyber768(),
                            CompliancePolicy::nist_sp800_208(),
                        );
                        let report = rt.block_on(orchestrator.run(&job, CancellationToken::new()));
                        black_box(report)
                    },
                    criterion::BatchSize::LargeInput,
                )
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_crypto, bench_batch);
criterion_main!(benches);
