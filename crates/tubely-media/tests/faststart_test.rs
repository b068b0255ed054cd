//! End-to-end rewrite tests over synthetic files.

mod common;

use common::{dir_len, offset_tables, sha256, top_level_types, Chunk, Mp4Builder, Table, Track};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tubely_media::mp4::{rewrite, rewrite_to, verify_fast_start, BoxType, FastStart};
use tubely_media::{prepare_for_streaming, AspectRatio, Error};

#[test]
fn test_round_trip_scenario() {
    // ftyp [0,500), mdat [500,10500), moov [10500,10700)
    let layout = Mp4Builder::new()
        .ftyp_size(500)
        .mdat_payload(vec![0xab; 9992])
        .moov_size(200)
        .track(Track::video(1920, 1080).chunks(vec![Chunk::InMdat(100)]))
        .build();
    assert_eq!(layout.mdat_start, 500);
    assert_eq!(layout.moov_start, Some(10_500));
    assert_eq!(layout.moov_size, 200);

    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("input.mp4"));
    assert_eq!(offset_tables(&input)[0].entries, vec![600]);
    assert!(!verify_fast_start(&input).unwrap());

    let output = dir.path().join("output.mp4");
    let outcome = rewrite_to(&input, &output).unwrap();
    assert_eq!(outcome, FastStart::Rewritten(output.clone()));

    assert_eq!(
        top_level_types(&output),
        vec![BoxType::FTYP, BoxType::MOOV, BoxType::MDAT]
    );
    assert_eq!(offset_tables(&output)[0].entries, vec![800]);
    assert!(verify_fast_start(&output).unwrap());
    assert_eq!(
        std::fs::metadata(&output).unwrap().len(),
        layout.bytes.len() as u64
    );
}

#[test]
fn test_open_ended_moov_gets_explicit_size() {
    let layout = Mp4Builder::new()
        .track(Track::video(1280, 720).chunks(vec![Chunk::InMdat(16)]))
        .build();
    let moov_start = layout.moov_start.unwrap() as usize;
    let mut bytes = layout.bytes.clone();
    // size 0: moov runs to the end of the file
    bytes[moov_start..moov_start + 4].copy_from_slice(&[0; 4]);

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("open_ended.mp4");
    std::fs::write(&input, &bytes).unwrap();
    let output = dir.path().join("out.mp4");

    let outcome = rewrite_to(&input, &output).unwrap();
    assert!(outcome.is_rewritten());
    assert_eq!(
        top_level_types(&output),
        vec![BoxType::FTYP, BoxType::MOOV, BoxType::MDAT]
    );

    let written = std::fs::read(&output).unwrap();
    let header = layout.mdat_start as usize;
    assert_eq!(
        &written[header..header + 4],
        &(layout.moov_size as u32).to_be_bytes()
    );
    assert_eq!(written.len(), bytes.len());
    assert_eq!(
        offset_tables(&output)[0].entries,
        vec![layout.mdat_start + 16 + layout.moov_size]
    );

    let prepared = prepare_for_streaming(&input, dir.path().join("prepared.mp4")).unwrap();
    assert!(prepared.rewritten);
    assert_eq!(prepared.aspect_ratio, AspectRatio::Landscape);
}

#[test]
fn test_rewrite_default_output_path() {
    let layout = Mp4Builder::new()
        .track(Track::video(640, 480).chunks(vec![Chunk::InMdat(8)]))
        .build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("clip.mp4"));

    let outcome = rewrite(&input).unwrap();
    assert_eq!(outcome.path(), dir.path().join("clip.mp4.faststart.mp4"));
    assert!(outcome.path().exists());
}

#[test]
fn test_already_compliant_is_untouched() {
    let layout = Mp4Builder::new()
        .moov_first()
        .track(Track::video(1280, 720).chunks(vec![Chunk::InMdat(8), Chunk::InMdat(64)]))
        .build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("compliant.mp4"));
    let output = dir.path().join("out.mp4");
    let before = sha256(&input);

    let first = rewrite_to(&input, &output).unwrap();
    let second = rewrite_to(&input, &output).unwrap();

    assert_eq!(first, FastStart::AlreadyFastStart(input.clone()));
    assert_eq!(second, first);
    assert!(!output.exists());
    assert_eq!(sha256(&input), before);
}

#[test]
fn test_rewrite_of_result_is_noop() {
    let layout = Mp4Builder::new()
        .track(Track::video(1280, 720).chunks(vec![Chunk::InMdat(16)]))
        .build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("in.mp4"));
    let first = rewrite_to(&input, dir.path().join("once.mp4")).unwrap();
    let checksum = sha256(first.path());

    let again = rewrite_to(first.path(), dir.path().join("twice.mp4")).unwrap();
    assert_eq!(again, FastStart::AlreadyFastStart(first.path().to_path_buf()));
    assert!(!dir.path().join("twice.mp4").exists());
    assert_eq!(sha256(first.path()), checksum);
}

#[test]
fn test_missing_moov() {
    let layout = Mp4Builder::new().without_moov().build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("bare.mp4"));
    let output = dir.path().join("out.mp4");

    assert!(!verify_fast_start(&input).unwrap());
    assert!(matches!(
        rewrite_to(&input, &output),
        Err(Error::MalformedContainer { box_type, .. }) if box_type == BoxType::MOOV
    ));
    assert!(!output.exists());
}

#[test]
fn test_entry_into_old_moov_leaves_no_trace() {
    let layout = Mp4Builder::new()
        .track(Track::video(1280, 720).chunks(vec![Chunk::InMdat(8)]))
        .build();
    let moov_start = layout.moov_start.unwrap();

    // Same file, but the chunk now points into moov itself
    let layout = Mp4Builder::new()
        .track(Track::video(1280, 720).chunks(vec![Chunk::Absolute(moov_start + 4)]))
        .build();

    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("bad.mp4"));
    let before = sha256(&input);
    let output = dir.path().join("out.mp4");

    assert!(matches!(
        rewrite_to(&input, &output),
        Err(Error::UnsupportedLayout(_))
    ));
    assert_eq!(sha256(&input), before);
    assert!(!output.exists());
    // no temporary file left behind
    assert_eq!(dir_len(dir.path()), 1);
}

#[test]
fn test_entries_before_mdat_are_untouched() {
    let layout = Mp4Builder::new()
        .free_before_mdat(64)
        .track(Track::video(1280, 720).chunks(vec![Chunk::Absolute(40), Chunk::InMdat(8)]))
        .build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("in.mp4"));
    let output = dir.path().join("out.mp4");

    rewrite_to(&input, &output).unwrap();

    let new_mdat_start = layout.mdat_start + layout.moov_size;
    assert_eq!(
        offset_tables(&output)[0].entries,
        vec![40, new_mdat_start + 8]
    );
    assert_eq!(
        top_level_types(&output),
        vec![BoxType::FTYP, BoxType::FREE, BoxType::MOOV, BoxType::MDAT]
    );
}

#[test]
fn test_trailing_boxes_are_kept() {
    let layout = Mp4Builder::new()
        .trailing_free(32)
        .track(Track::video(1280, 720).chunks(vec![Chunk::InMdat(8)]))
        .build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("in.mp4"));
    let output = dir.path().join("out.mp4");

    rewrite_to(&input, &output).unwrap();
    assert_eq!(
        top_level_types(&output),
        vec![BoxType::FTYP, BoxType::MOOV, BoxType::MDAT, BoxType::FREE]
    );
}

#[test]
fn test_extended_mdat_header() {
    let layout = Mp4Builder::new()
        .extended_mdat()
        .track(
            Track::video(1280, 720)
                .table(Table::Co64)
                .chunks(vec![Chunk::InMdat(16), Chunk::InMdat(100)]),
        )
        .build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("in.mp4"));
    let output = dir.path().join("out.mp4");

    rewrite_to(&input, &output).unwrap();

    let new_mdat_start = layout.mdat_start + layout.moov_size;
    assert_eq!(
        offset_tables(&output)[0].entries,
        vec![new_mdat_start + 16, new_mdat_start + 100]
    );
    assert!(verify_fast_start(&output).unwrap());
}

#[test]
fn test_track_without_offset_table_is_skipped() {
    let layout = Mp4Builder::new()
        .track(Track::audio().table(Table::Missing))
        .track(Track::video(1280, 720).chunks(vec![Chunk::InMdat(8)]))
        .build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("in.mp4"));
    let output = dir.path().join("out.mp4");

    rewrite_to(&input, &output).unwrap();

    let tables = offset_tables(&output);
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].track_index, 1);
    assert_eq!(
        tables[0].entries,
        vec![layout.mdat_start + layout.moov_size + 8]
    );
}

/// Randomized offset correctness: every entry into the old `mdat` keeps its
/// distance from the start of `mdat`, points at the same bytes, and entries
/// outside `mdat` do not move.
#[test]
fn test_offsets_preserved_across_random_layouts() {
    let mut rng = StdRng::seed_from_u64(0x7ab1e);
    let dir = tempfile::tempdir().unwrap();

    for round in 0..40 {
        let mdat_len = rng.gen_range(64..4096usize);
        let mut payload = vec![0u8; mdat_len];
        rng.fill(payload.as_mut_slice());

        let ftyp_size = rng.gen_range(16..64usize);
        let free_before = if rng.gen_bool(0.3) {
            rng.gen_range(8..48usize)
        } else {
            0
        };
        let prefix = (ftyp_size + free_before) as u64;
        let extended = rng.gen_bool(0.2);
        let header = if extended { 16 } else { 8 };

        let mut builder = Mp4Builder::new()
            .ftyp_size(ftyp_size)
            .free_before_mdat(free_before)
            .mdat_payload(payload);
        if extended {
            builder = builder.extended_mdat();
        }
        if rng.gen_bool(0.3) {
            builder = builder.trailing_free(rng.gen_range(8..32usize));
        }

        let tracks = rng.gen_range(1..6);
        for t in 0..tracks {
            let table = if rng.gen_bool(0.5) {
                Table::Stco
            } else {
                Table::Co64
            };
            let chunks = (0..rng.gen_range(0..24))
                .map(|_| {
                    if rng.gen_bool(0.1) {
                        Chunk::Absolute(rng.gen_range(0..prefix))
                    } else {
                        Chunk::InMdat(rng.gen_range(header..header + mdat_len as u64))
                    }
                })
                .collect();
            let track = if t == 0 {
                Track::video(1920, 1080)
            } else {
                Track::audio()
            };
            builder = builder.track(track.table(table).chunks(chunks));
        }

        let layout = builder.build();
        let input = layout.write_to(&dir.path().join(format!("in-{round}.mp4")));
        let output = dir.path().join(format!("out-{round}.mp4"));

        let outcome = rewrite_to(&input, &output).unwrap();
        assert!(outcome.is_rewritten(), "round {round}");
        assert!(verify_fast_start(&output).unwrap(), "round {round}");

        let old_bytes = std::fs::read(&input).unwrap();
        let new_bytes = std::fs::read(&output).unwrap();
        assert_eq!(old_bytes.len(), new_bytes.len(), "round {round}");

        let old_mdat = layout.mdat_start;
        let new_mdat = old_mdat + layout.moov_size;
        let old_tables = offset_tables(&input);
        let new_tables = offset_tables(&output);
        assert_eq!(old_tables.len(), new_tables.len(), "round {round}");

        for (old, new) in old_tables.iter().zip(&new_tables) {
            assert_eq!(old.kind, new.kind);
            assert_eq!(old.entries.len(), new.entries.len());
            for (&o, &n) in old.entries.iter().zip(&new.entries) {
                if o >= old_mdat {
                    assert_eq!(n - new_mdat, o - old_mdat, "round {round}");
                    assert_eq!(old_bytes[o as usize], new_bytes[n as usize], "round {round}");
                } else {
                    assert_eq!(n, o, "round {round}");
                }
            }
        }
    }
}

#[test]
fn test_verifier_soundness() {
    let dir = tempfile::tempdir().unwrap();
    for (i, (w, h)) in [(1920u16, 1080u16), (1080, 1920), (512, 512)].into_iter().enumerate() {
        let layout = Mp4Builder::new()
            .track(Track::video(w, h).chunks(vec![Chunk::InMdat(8)]))
            .build();
        let input = layout.write_to(&dir.path().join(format!("in-{i}.mp4")));
        assert!(!verify_fast_start(&input).unwrap());

        let output = rewrite_to(&input, dir.path().join(format!("out-{i}.mp4"))).unwrap();
        assert!(verify_fast_start(output.path()).unwrap());
    }
}

#[test]
fn test_prepare_rewrites_and_classifies() {
    let layout = Mp4Builder::new()
        .track(Track::audio().chunks(vec![Chunk::InMdat(8)]))
        .track(Track::video(1920, 1080).chunks(vec![Chunk::InMdat(32)]))
        .build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("upload.mp4"));
    let output = dir.path().join("upload.processing.mp4");

    let prepared = prepare_for_streaming(&input, &output).unwrap();
    assert!(prepared.rewritten);
    assert_eq!(prepared.path, output);
    assert_eq!(prepared.aspect_ratio, AspectRatio::Landscape);
    assert_eq!(prepared.geometry.width_px(), 1920);
    assert_eq!(prepared.geometry.height_px(), 1080);
}

#[test]
fn test_prepare_compliant_portrait() {
    let layout = Mp4Builder::new()
        .moov_first()
        .track(Track::video(1080, 1920).chunks(vec![Chunk::InMdat(8)]))
        .build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("upload.mp4"));
    let output = dir.path().join("upload.processing.mp4");

    let prepared = prepare_for_streaming(&input, &output).unwrap();
    assert!(!prepared.rewritten);
    assert_eq!(prepared.path, input);
    assert_eq!(prepared.aspect_ratio, AspectRatio::Portrait);
    assert!(!output.exists());
}

#[test]
fn test_prepare_without_video_removes_output() {
    let layout = Mp4Builder::new()
        .track(Track::audio().chunks(vec![Chunk::InMdat(8)]))
        .build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("audio.mp4"));
    let output = dir.path().join("audio.processing.mp4");

    assert!(matches!(
        prepare_for_streaming(&input, &output),
        Err(Error::NoVideoTrack)
    ));
    assert!(!output.exists());
}

#[test]
fn test_prepare_zero_dimensions() {
    let layout = Mp4Builder::new()
        .moov_first()
        .track(Track::video(0, 1080))
        .build();
    let dir = tempfile::tempdir().unwrap();
    let input = layout.write_to(&dir.path().join("zero.mp4"));

    assert!(matches!(
        prepare_for_streaming(&input, dir.path().join("out.mp4")),
        Err(Error::InvalidDimensions {
            width: 0,
            height: 1080
        })
    ));
}
