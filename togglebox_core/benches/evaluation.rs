use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use togglebox_core::experiments::{
    assign_variation, Experiment, ExperimentStatus, ExperimentTargeting, TrafficSplit, Variation,
};
use togglebox_core::flags::{
    evaluate_flag, CountryRule, Flag, FlagType, ServedValue, Targeting,
};
use togglebox_core::EvaluationContext;

fn rollout_flag() -> Flag {
    Flag {
        flag_key: "new-checkout".into(),
        enabled: true,
        flag_type: FlagType::Boolean,
        value_a: true.into(),
        value_b: false.into(),
        default_value: ServedValue::B,
        targeting: Targeting {
            countries: vec![CountryRule {
                country: "US".into(),
                serve_value: ServedValue::A,
                languages: vec![],
            }],
            force_include_users: vec![],
            force_exclude_users: vec![],
        },
        rollout_enabled: true,
        rollout_percentage_a: 30.0,
        rollout_percentage_b: 70.0,
        version: "v3".into(),
    }
}

fn four_arm_experiment() -> Experiment {
    let keys = ["control", "cta-green", "cta-large", "cta-moved"];
    Experiment {
        experiment_key: "checkout-cta".into(),
        status: ExperimentStatus::Running,
        variations: keys
            .iter()
            .enumerate()
            .map(|(i, key)| Variation {
                key: (*key).into(),
                name: (*key).into(),
                value: (*key).into(),
                is_control: i == 0,
            })
            .collect(),
        control_variation: "control".into(),
        traffic_allocation: keys
            .iter()
            .map(|key| TrafficSplit {
                variation_key: (*key).into(),
                percentage: 25.0,
            })
            .collect(),
        targeting: ExperimentTargeting::default(),
        primary_metric: None,
        secondary_metrics: vec![],
        confidence_level: 0.95,
        winner: None,
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let flag = rollout_flag();
    let experiment = four_arm_experiment();

    {
        let mut group = c.benchmark_group("flag-rollout");
        group.throughput(Throughput::Elements(1));
        let context = EvaluationContext::new("subject1");
        group.bench_function("evaluate_flag", |b| {
            b.iter(|| evaluate_flag(black_box(&flag), black_box(&context)))
        });
        group.finish();
    }

    {
        let mut group = c.benchmark_group("flag-country-rule");
        group.throughput(Throughput::Elements(1));
        let context = EvaluationContext::new("subject1").with_country("US");
        group.bench_function("evaluate_flag", |b| {
            b.iter(|| evaluate_flag(black_box(&flag), black_box(&context)))
        });
        group.finish();
    }

    {
        let mut group = c.benchmark_group("experiment-assignment");
        group.throughput(Throughput::Elements(1));
        let context = EvaluationContext::new("subject1");
        group.bench_function("assign_variation", |b| {
            b.iter(|| assign_variation(black_box(&experiment), black_box(&context)))
        });
        group.finish();
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default().noise_threshold(0.02);
    targets = criterion_benchmark);
criterion_main!(benches);
