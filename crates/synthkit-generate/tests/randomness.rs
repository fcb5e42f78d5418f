mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use common::{
    Person, Team, domain, person_registry, record_draws, shared_stream, split_draw, team_registry,
};
use synthkit_generate::{Faker, GeneratorOptions, Rng, RuleBuilder, SharedRandomness};

fn random_person() -> Faker<Person> {
    let mut faker = Faker::new(person_registry());
    faker
        .rule_for("name", |ctx, _| format!("user{}", ctx.random_range(0..10_000_u32)))
        .expect("name rule")
        .rule_for("age", |ctx, _| ctx.random_range(18..90_u32))
        .expect("age rule");
    faker
}

#[test]
fn same_local_seed_gives_same_sequence() {
    let mut a = random_person();
    let mut b = random_person();
    a.use_seed(42);
    b.use_seed(42);

    assert_eq!(
        a.generate_many(10, None).expect("a"),
        b.generate_many(10, None).expect("b")
    );
}

#[test]
fn seed_from_options_matches_use_seed() {
    let mut from_options = Faker::with_options(
        person_registry(),
        GeneratorOptions::default().with_seed(7),
    );
    from_options
        .rule_for("age", |ctx, _| ctx.random_range(0..1_000_000_u32))
        .expect("age rule");

    let mut explicit = Faker::new(person_registry());
    explicit
        .rule_for("age", |ctx, _| ctx.random_range(0..1_000_000_u32))
        .expect("age rule")
        .use_seed(7);

    assert_eq!(
        from_options.generate_many(5, None).expect("options"),
        explicit.generate_many(5, None).expect("explicit")
    );
}

#[test]
fn same_domain_seed_gives_same_sequence() {
    let a = random_person().in_domain(domain(11));
    let b = random_person().in_domain(domain(11));

    assert_eq!(
        a.generate_many(10, None).expect("a"),
        b.generate_many(10, None).expect("b")
    );
}

#[test]
fn reseeding_the_domain_restarts_the_shared_stream() {
    let shared = domain(5);
    let faker = random_person().in_domain(Arc::clone(&shared));

    let first = faker.generate_many(4, None).expect("first");
    shared.reseed(5);
    let second = faker.generate_many(4, None).expect("second");
    assert_eq!(first, second);
}

#[test]
fn populate_draws_like_generate() {
    let mut generated = random_person();
    let mut populated = random_person();
    generated.use_seed(3);
    populated.use_seed(3);

    let mut person = Person::default();
    populated.populate(&mut person, None).expect("populate");
    assert_eq!(person, generated.generate(None).expect("generate"));
}

#[test]
fn clone_replays_the_local_seed_from_the_start() {
    let mut original = random_person();
    original.use_seed(21);
    let first = original.generate(None).expect("first");
    original.generate_many(3, None).expect("advance");

    let copy = original.clone();
    assert_eq!(copy.generate(None).expect("copy"), first);
}

#[test]
fn index_counters_are_captured_per_epoch() {
    let shared = domain(1);
    let mut a = Faker::new(person_registry()).in_domain(Arc::clone(&shared));
    let mut b = Faker::new(person_registry()).in_domain(Arc::clone(&shared));
    for faker in [&mut a, &mut b] {
        faker
            .rule_for("name", |ctx, _| ctx.index_global().to_string())
            .expect("name rule")
            .rule_for("age", |ctx, _| ctx.index_faker() as u32)
            .expect("age rule");
    }

    let first = a.generate(None).expect("a1");
    let second = b.generate(None).expect("b1");
    let third = a.generate(None).expect("a2");

    assert_eq!((first.name.as_str(), first.age), ("0", 0));
    assert_eq!((second.name.as_str(), second.age), ("1", 0));
    assert_eq!((third.name.as_str(), third.age), ("2", 1));

    shared.reset_index();
    assert_eq!(b.generate(None).expect("b2").name, "0");
}

#[test]
fn concurrent_generation_serializes_epochs() {
    let mut faker = Faker::new(person_registry()).in_domain(domain(9));
    faker
        .rule_for("name", |ctx, _| ctx.index_global().to_string())
        .expect("name rule");

    let indexes: BTreeSet<u64> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| faker.generate_many(50, None).expect("worker")))
            .collect();
        workers
            .into_iter()
            .flat_map(|worker| worker.join().expect("join"))
            .map(|person| person.name.parse::<u64>().expect("index"))
            .collect()
    });

    assert_eq!(indexes.len(), 400);
    assert_eq!(indexes.first(), Some(&0));
    assert_eq!(indexes.last(), Some(&399));
}

fn drawing_person(shared: &Arc<SharedRandomness>) -> Faker<Person> {
    let mut faker = Faker::new(person_registry()).in_domain(Arc::clone(shared));
    record_draws(&mut faker);
    faker
}

#[test]
fn distinct_generators_in_one_domain_never_interleave() {
    let shared = domain(12);
    let fakers: Vec<Faker<Person>> = (0..6).map(|_| drawing_person(&shared)).collect();

    let batches: Vec<Vec<Person>> = thread::scope(|scope| {
        let workers: Vec<_> = fakers
            .iter()
            .map(|faker| scope.spawn(move || faker.generate_many(40, None).expect("worker")))
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("join"))
            .collect()
    });

    for batch in &batches {
        let ages: Vec<u32> = batch.iter().map(|person| person.age).collect();
        assert_eq!(ages, (0..40).collect::<Vec<_>>());
    }

    let mut draws: Vec<(u64, u64)> = batches.iter().flatten().map(split_draw).collect();
    draws.sort_unstable();
    let indexes: Vec<u64> = draws.iter().map(|(index, _)| *index).collect();
    assert_eq!(indexes, (0..240).collect::<Vec<_>>());
    let values: Vec<u64> = draws.into_iter().map(|(_, draw)| draw).collect();
    assert_eq!(values, shared_stream(12, 240));
}

#[test]
fn seeded_generators_ignore_concurrent_shared_draws() {
    let seeds = [31_u64, 32, 33];
    let solo: Vec<Vec<Person>> = seeds
        .iter()
        .map(|&seed| {
            let mut faker = random_person();
            faker.use_seed(seed);
            faker.generate_many(30, None).expect("solo")
        })
        .collect();

    let shared = domain(13);
    let seeded: Vec<Faker<Person>> = seeds
        .iter()
        .map(|&seed| {
            let mut faker = random_person().in_domain(Arc::clone(&shared));
            faker.use_seed(seed);
            faker
        })
        .collect();
    let noisy: Vec<Faker<Person>> = (0..3).map(|_| drawing_person(&shared)).collect();

    let concurrent: Vec<Vec<Person>> = thread::scope(|scope| {
        let noise: Vec<_> = noisy
            .iter()
            .map(|faker| scope.spawn(move || faker.generate_many(30, None).expect("noise")))
            .collect();
        let runs: Vec<_> = seeded
            .iter()
            .map(|faker| scope.spawn(move || faker.generate_many(30, None).expect("seeded")))
            .collect();
        for worker in noise {
            worker.join().expect("join noise");
        }
        runs.into_iter()
            .map(|worker| worker.join().expect("join seeded"))
            .collect()
    });

    assert_eq!(concurrent, solo);
}

#[test]
fn producers_may_generate_nested_objects() {
    let shared = domain(4);
    let mut leads = Faker::new(person_registry()).in_domain(Arc::clone(&shared));
    leads
        .rule_for("name", |ctx, _| format!("lead{}", ctx.index_global()))
        .expect("lead name");

    let mut teams = Faker::new(team_registry()).in_domain(Arc::clone(&shared));
    teams
        .rule_for("title", |ctx, _| format!("team{}", ctx.index_global()))
        .expect("title rule")
        .rule_for("lead", move |_, _| leads.generate(None).expect("lead"))
        .expect("lead rule");

    let team: Team = teams.generate(None).expect("team");
    assert_eq!(team.title, "team0");
    assert_eq!(team.lead.name, "lead1");
}
