use crate::*;
use crate::occupation::OccupationInterval;
use crate::input::scenario::parse_scenario;
use trackgraph::build_topology;

// b-0 | t-1 | t-2 | t-3 | b-4 with signals S0, S1, S2 facing B.
// Blocks: r-S0--r-S1--0 (200m), r-S1--r-S2--1 (800m).
const LINE: &str = r#"{
  "trackParts": [
    { "id": 0, "name": "b-0", "type": "Bumper",   "length": 10,  "aSide": [],  "bSide": [1] },
    { "id": 1, "name": "t-1", "type": "RailRoad", "length": 200, "aSide": [0], "bSide": [2] },
    { "id": 2, "name": "t-2", "type": "RailRoad", "length": 500, "aSide": [1], "bSide": [3],
      "stationPlatform": true },
    { "id": 3, "name": "t-3", "type": "RailRoad", "length": 300, "aSide": [2], "bSide": [4] },
    { "id": 4, "name": "b-4", "type": "Bumper",   "length": 10,  "aSide": [3], "bSide": [] }
  ],
  "signals": [
    { "name": "S0", "side": "B", "track": 0 },
    { "name": "S1", "side": "B", "track": 1 },
    { "name": "S2", "side": "B", "track": 3 }
  ],
  "stations": [ { "stationName": "Ut", "platform": "1", "trackId": 2 } ]
}"#;

// Two trains over the 500m edge t-1 -> t-2, leaving at 0 and 30.
const FOLLOWING: &str = r#"{
  "types": [ { "name": "sprinter", "length": 100, "speed": 25 } ],
  "trains": [
    { "trainNumber": 1, "trainUnitTypes": ["sprinter"],
      "movements": [ { "startLocation": "t-1B", "endLocation": "t-2B", "startTime": 0, "endTime": 100 } ] },
    { "trainNumber": 2, "trainUnitTypes": ["sprinter"],
      "movements": [ { "startLocation": "t-1B", "endLocation": "t-2B", "startTime": 30, "endTime": 100 } ] }
  ],
  "walkingSpeed": 1.4, "headwayFollowing": 120, "headwayCrossing": 180
}"#;

const DWELL: &str = r#"{
  "types": [ { "name": "sprinter", "length": 100, "speed": 25 } ],
  "trains": [
    { "trainNumber": 7, "trainUnitTypes": ["sprinter"],
      "movements": [ { "startLocation": "b-0B", "endLocation": "t-3B", "startTime": 0, "endTime": 200,
                       "stops": { "UT|1": 100 } } ] }
  ]
}"#;

fn run(scenario: &str, config: &Config) -> Result<(trackgraph::TrackGraph, trackgraph::BlockGraph, Generated), GenerationError> {
    let (track, blocks) = build_topology(LINE).unwrap();
    let scenario = parse_scenario(scenario).unwrap();
    let generated = generate(&track, &blocks, &scenario, config)?;
    Ok((track, blocks, generated))
}

fn no_recovery() -> Config {
    Config { use_recovery_time: false, ..Default::default() }
}

fn write(track: &trackgraph::TrackGraph, blocks: &trackgraph::BlockGraph, g: &Generated, allowed: &[String]) -> String {
    let mut out = Vec::new();
    output::graph::write_graph(&mut out, track, blocks, &g.safe, &g.flexibility, allowed, g.num_trains).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_worked_example() {
    let (_, _, g) = run(FOLLOWING, &no_recovery()).unwrap();
    let recovery = 20.0 - 500.0 / (25.0 * 1.08);
    let a = OccupationInterval { start: 0.0, end: 24.0, duration: 20.0, train: 1, recovery };
    let b = OccupationInterval { start: 30.0, end: 54.0, duration: 20.0, train: 2, recovery };

    // Both blocks meet at t-1B, so both are claimed.
    assert_eq!(g.merged[1], vec![a, b]);
    assert_eq!(g.merged[0], vec![a, b]);
    assert_eq!(g.global_end, 200.0);

    let windows: Vec<(f64, f64, TrainId, TrainId)> = g.safe.by_block[1].iter()
        .map(|&i| g.safe.intervals[i])
        .map(|s| (s.start, s.end, s.train_before, s.train_after))
        .collect();
    assert_eq!(windows, vec![(24.0, 30.0, 1, 2), (54.0, 200.0, 2, 0)]);

    assert_eq!(g.flexibility.buffer(1, 1), 6.0);
    assert_eq!(g.flexibility.buffer(1, 0), 6.0);
}

#[test]
fn test_recovery_tops_up_buffer() {
    let (_, _, g) = run(FOLLOWING, &Config::default()).unwrap();
    let recovery = 20.0 - 500.0 / (25.0 * 1.08);
    assert_eq!(g.flexibility.buffer(1, 1), 6.0 + recovery);
    assert_eq!(g.flexibility.recovery(1, 1), recovery);

    let capped = Config { max_buffer_time: 3.0, ..Default::default() };
    let (_, _, g) = run(FOLLOWING, &capped).unwrap();
    assert_eq!(g.flexibility.buffer(1, 1), 3.0);
}

#[test]
fn test_last_block_buffer_infinite() {
    let (_, _, g) = run(FOLLOWING, &Config::default()).unwrap();
    assert!(g.flexibility.buffer(2, 1).is_infinite());
    // Never reserved by train 1.
    assert_eq!(g.flexibility.buffer(1, 5), 0.0);
}

#[test]
fn test_buffer_on_repeated_visit() {
    // Train 1 passes the block again long after train 2 has used it.
    let scenario = r#"{
      "types": [ { "name": "sprinter", "length": 100, "speed": 25 } ],
      "trains": [
        { "trainNumber": 1, "trainUnitTypes": ["sprinter"],
          "movements": [
            { "startLocation": "t-1B", "endLocation": "t-2B", "startTime": 0,   "endTime": 100 },
            { "startLocation": "t-1B", "endLocation": "t-2B", "startTime": 100, "endTime": 200 } ] },
        { "trainNumber": 2, "trainUnitTypes": ["sprinter"],
          "movements": [ { "startLocation": "t-1B", "endLocation": "t-2B", "startTime": 30, "endTime": 100 } ] }
      ]
    }"#;
    let (_, _, g) = run(scenario, &no_recovery()).unwrap();
    assert_eq!(g.plans[0].occupied_until, vec![vec![24.0], vec![124.0]]);
    assert!(g.occupations[1].iter().any(|i| i.train == 1 && i.start == 100.0));
    assert_eq!(g.flexibility.buffer(1, 1), 6.0);
    assert_eq!(g.flexibility.buffer(1, 0), 6.0);
}

#[test]
fn test_subject_train_left_out() {
    let config = Config { agent: Some(1), ..Default::default() };
    let (_, _, g) = run(FOLLOWING, &config).unwrap();
    assert!(g.merged[1].iter().all(|i| i.train == 2));
    let first = g.safe.intervals[g.safe.by_block[1][0]];
    assert_eq!((first.start, first.end, first.train_before, first.train_after), (0.0, 30.0, 0, 2));
    // Still planned, so its route is known.
    assert!(g.occupations[1].iter().any(|i| i.train == 1));
}

#[test]
fn test_dwell_and_sighting() {
    let (_, _, g) = run(DWELL, &Config::default()).unwrap();
    assert_eq!(g.plans[0].routes[0].blocks, vec![0, 1]);
    assert_eq!(g.plans[0].routes[0].step_block, vec![Some(0), Some(1), Some(1)]);

    // t-2 -> t-3 departs at 100: 72s station time, 12 of it above the minimum.
    let stop = OccupationInterval { start: 28.0, end: 116.0, duration: 84.0, train: 7, recovery: 12.0 };
    assert!(g.occupations[1].contains(&stop));

    // Sighting reservation for the next block while on the first one.
    let sighting = OccupationInterval { start: 0.0, end: 8.0, duration: 0.0, train: 7, recovery: 0.0 };
    assert!(g.occupations[1].contains(&sighting));

    assert_eq!(g.merged[1].len(), 1);
    assert_eq!((g.merged[1][0].start, g.merged[1][0].end), (0.0, 116.0));
    assert_eq!(g.plans[0].recovery[0][1], 20.0 - 500.0 / (25.0 * 1.08) + 12.0);
}

#[test]
fn test_properties() {
    for scenario in &[FOLLOWING, DWELL] {
        let (_, blocks, g) = run(scenario, &Config::default()).unwrap();
        for b in 0..blocks.edges.len() {
            let merged = &g.merged[b];
            for w in merged.windows(2) {
                assert!(w[0].end < w[1].start, "overlap on block {}", b);
            }

            // Safe intervals and occupations tile the horizon.
            let mut pieces: Vec<(f64, f64)> = merged.iter()
                .map(|i| (i.start.max(0.0), i.end.min(g.global_end)))
                .filter(|&(s, e)| e > s)
                .collect();
            pieces.extend(g.safe.by_block[b].iter().map(|&i| (g.safe.intervals[i].start, g.safe.intervals[i].end)));
            pieces.sort_by(|x, y| x.partial_cmp(y).unwrap());
            let mut t = 0.0;
            for (s, e) in pieces {
                assert_eq!(s, t, "gap or overlap on block {}", b);
                t = e;
            }
            assert_eq!(t, g.global_end);
        }
        for e in &g.safe.edges {
            assert!(e.alpha < e.beta);
        }
    }
}

#[test]
fn test_atf_edges() {
    let config = Config { running_time_margin: 1.0, ..Default::default() };
    let (_, _, g) = run(FOLLOWING, &config).unwrap();
    assert_eq!(g.safe.edges.len(), 2);
    let e = g.safe.edges[0];
    assert_eq!((e.from, e.to), (0, 2));
    assert_eq!((e.zeta, e.alpha, e.beta, e.delta), (24.0, 24.0, 25.0, 5.0));
    assert_eq!((e.train_before, e.train_after), (1, 2));
    assert!(e.buffer_after.is_infinite());
}

#[test]
fn test_heuristic() {
    let config = Config { destination: Some("S2".to_string()), ..Default::default() };
    let (_, blocks, g) = run(FOLLOWING, &config).unwrap();
    assert!(g.safe.edges.iter().all(|e| e.heuristic == 20.0));
    assert_eq!(safe::heuristic(&blocks, blocks.find_node("S1"), 40.0), vec![5.0, 0.0]);

    let config = Config { destination: Some("r-S1--r-S2--1".to_string()), ..Default::default() };
    let (_, _, g) = run(FOLLOWING, &config).unwrap();
    assert!(g.safe.edges.iter().all(|e| e.heuristic == 0.0));

    let config = Config { destination: Some("nowhere".to_string()), ..Default::default() };
    match run(FOLLOWING, &config) {
        Err(GenerationError::UnknownDestination(d)) => assert_eq!(d, "nowhere"),
        other => panic!("expected unknown destination, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_output_format() {
    let config = Config { running_time_margin: 1.0, ..Default::default() };
    let (track, blocks, g) = run(FOLLOWING, &config).unwrap();
    let expected = "\
vertex count: 4
edge count: 2
r-S0--r-S1--0 24 30 1 2 inf
r-S0--r-S1--0 54 200 2 0 0
r-S1--r-S2--1 24 30 1 2 inf
r-S1--r-S2--1 54 200 2 0 0
0 2 24 24 25 5 1 0 2 inf 0 0
1 3 54 54 195 5 2 0 0 0 0 0
num_trains 2
";
    assert_eq!(write(&track, &blocks, &g, &[]), expected);

    // Same input, same bytes.
    let (track2, blocks2, g2) = run(FOLLOWING, &config).unwrap();
    assert_eq!(write(&track2, &blocks2, &g2, &[]), expected);
}

#[test]
fn test_allowed_tracks() {
    let (track, blocks, g) = run(FOLLOWING, &Config::default()).unwrap();
    let out = write(&track, &blocks, &g, &["t-3".to_string()]);
    assert!(out.contains("edge count: 2\n"));
    let out = write(&track, &blocks, &g, &["4".to_string()]);
    assert!(out.starts_with("vertex count: 4\nedge count: 0\n"));
}

#[test]
fn test_movement_without_path() {
    let scenario = r#"{
      "types": [ { "name": "sprinter", "length": 100, "speed": 25 } ],
      "trains": [ { "trainNumber": 3, "trainUnitTypes": ["sprinter"],
        "movements": [ { "startLocation": "b-0B", "endLocation": "b-0A", "startTime": 0, "endTime": 10 } ] } ]
    }"#;
    match run(scenario, &Config::default()) {
        Err(GenerationError::Movement { train, index, cause }) => {
            assert_eq!((train, index), (3, 0));
            assert_eq!(format!("{}", cause), "no path found between b-0B and b-0A");
        }
        other => panic!("expected a path failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_invalid_train_units() {
    use maplit::hashmap;
    let cases = hashmap!{
        r#"["ghost"]"# => "unknown train unit type ghost in train 4",
        r#"["sprinter", "ghost"]"# => "unknown train unit type ghost in train 4",
        "[]" => "train 4 has no train units",
    };
    for (units, message) in cases {
        let scenario = format!(r#"{{
          "types": [ {{ "name": "sprinter", "length": 100, "speed": 25 }} ],
          "trains": [ {{ "trainNumber": 4, "trainUnitTypes": {}, "movements": [] }} ]
        }}"#, units);
        match run(&scenario, &Config::default()) {
            Err(e) => assert_eq!(format!("{}", e), message, "units {}", units),
            Ok(_) => panic!("train units {} accepted", units),
        }
    }
}

#[test]
fn test_write_output() {
    let config = Config { running_time_margin: 1.0, ..Default::default() };
    let (track, blocks, g) = run(FOLLOWING, &config).unwrap();
    let path = std::env::temp_dir().join(format!("atfgraph-output-{}.txt", std::process::id()));
    write_output(&path, &track, &blocks, &g, &[]).unwrap();
    let written = read_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(written, write(&track, &blocks, &g, &[]));
    assert!(written.ends_with("num_trains 2\n"));
}
