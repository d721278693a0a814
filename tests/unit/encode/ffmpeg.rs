use super::*;

fn opts(frames: FrameSource) -> SynthesisOpts {
    SynthesisOpts {
        output: PathBuf::from("out/video.mp4"),
        overwrite: true,
        frames,
        canvas: Canvas {
            width: 64,
            height: 36,
        },
        input_fps: Fps::integer(30),
        output_fps: Fps::integer(30),
        frame_count: 90,
        video: VideoCodecConf::default(),
        input_options: Vec::new(),
        output_options: Vec::new(),
    }
}

fn sequence() -> FrameSource {
    FrameSource::Sequence {
        pattern: PathBuf::from("cache/%06d.png"),
    }
}

fn window<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[test]
fn filter_graph_has_delay_chains_and_one_mix() {
    let tracks = vec![AudioTrack::new("a.mp3", 0.0), AudioTrack::new("b.mp3", 6.0)];
    let graph = build_audio_filter(&tracks, 12.0).unwrap();
    assert_eq!(
        graph,
        "[1]adelay=0|0[a0];[2]adelay=6000|6000[a1];[a0][a1]amix=2[aout]"
    );
    assert!(build_audio_filter(&[], 12.0).is_none());
}

#[test]
fn shaping_filters_are_prepended_only_when_needed() {
    let track = AudioTrack {
        volume: 0.5,
        fade_in: 1.0,
        fade_out: 2.0,
        ..AudioTrack::new("m.wav", 3.0)
    };
    let graph = build_audio_filter(&[track], 10.0).unwrap();
    assert_eq!(
        graph,
        "[1]volume=0.5,afade=t=in:st=0:d=1,afade=t=out:st=5:d=2,adelay=3000|3000[a0];[a0]amix=1[aout]"
    );
}

#[test]
fn sequence_command_shape() {
    let mut job = Synthesis::new(opts(sequence()));
    let mut looped = AudioTrack::new("bed.mp3", 0.0);
    looped.looped = true;
    job.set_audio_tracks(vec![looped, AudioTrack::new("voice.wav", 1.5)]);
    let args = job.command_args();

    assert_eq!(args[0], "-y");
    assert_eq!(window(&args, "-progress"), Some("pipe:1"));
    assert!(args.iter().any(|a| a == "-nostats"));
    assert_eq!(window(&args, "-framerate"), Some("30"));
    assert_eq!(window(&args, "-start_number"), Some("0"));

    let inputs: Vec<&str> = args
        .iter()
        .enumerate()
        .filter(|(_, a)| *a == "-i")
        .map(|(i, _)| args[i + 1].as_str())
        .collect();
    assert_eq!(inputs, ["cache/%06d.png", "bed.mp3", "voice.wav"]);

    let loop_at = args.iter().position(|a| a == "-stream_loop").unwrap();
    assert_eq!(args[loop_at + 1], "-1");
    assert_eq!(args[loop_at + 3], "bed.mp3");

    assert!(
        window(&args, "-filter_complex")
            .unwrap()
            .ends_with("[a0][a1]amix=2[aout]")
    );
    assert_eq!(window(&args, "-c:a"), Some("aac"));
    assert!(args.iter().any(|a| a == "-shortest"));
    assert_eq!(window(&args, "-crf"), Some("23"));
    assert_eq!(args.last().map(String::as_str), Some("out/video.mp4"));
}

#[test]
fn raw_command_reads_stdin_and_drops_audio() {
    let mut o = opts(FrameSource::Raw { files: Vec::new() });
    o.overwrite = false;
    o.video.bitrate = Some("2M".to_owned());
    o.input_options = vec!["-thread_queue_size".to_owned(), "512".to_owned()];
    o.output_options = vec!["-tune".to_owned(), "animation".to_owned()];
    o.output_fps = Fps::new(30000, 1001).unwrap();
    let args = Synthesis::new(o).command_args();

    assert_eq!(args[0], "-n");
    assert_eq!(window(&args, "-f"), Some("rawvideo"));
    assert_eq!(window(&args, "-pix_fmt"), Some("rgba"));
    assert_eq!(window(&args, "-s"), Some("64x36"));
    assert_eq!(window(&args, "-i"), Some("pipe:0"));
    assert!(args.iter().any(|a| a == "-an"));
    assert!(!args.iter().any(|a| a == "-filter_complex"));
    assert_eq!(window(&args, "-b:v"), Some("2M"));
    assert!(!args.iter().any(|a| a == "-crf"));
    assert_eq!(window(&args, "-r"), Some("30000/1001"));

    let input_opt = args.iter().position(|a| a == "-thread_queue_size").unwrap();
    let frame_input = args.iter().position(|a| a == "pipe:0").unwrap();
    assert!(input_opt < frame_input);
    let tune = args.iter().position(|a| a == "-tune").unwrap();
    assert_eq!(tune, args.len() - 3);
}

#[test]
fn progress_lines_and_fraction() {
    assert_eq!(parse_progress_frame("frame=42"), Some(42));
    assert_eq!(parse_progress_frame("frame= 7 "), Some(7));
    assert_eq!(parse_progress_frame("fps=30.0"), None);
    assert_eq!(parse_progress_frame("progress=end"), None);

    assert_eq!(progress_fraction(45, 90), 0.5);
    assert_eq!(progress_fraction(120, 90), 1.0);
    assert_eq!(progress_fraction(3, 0), 1.0);
}

#[test]
fn expected_frames_follow_output_rate() {
    let mut o = opts(sequence());
    o.input_fps = Fps::integer(60);
    o.frame_count = 120;
    o.output_fps = Fps::integer(25);
    assert!((o.duration_secs() - 2.0).abs() < 1e-9);
    assert_eq!(o.expected_output_frames(), 50);
}

#[test]
fn raw_file_count_mismatch_fails_before_spawning() {
    let mut events = Vec::new();
    let mut job = Synthesis::new(opts(FrameSource::Raw {
        files: vec![PathBuf::from("0.rgba")],
    }));
    let err = job.start(&mut |e| events.push(e)).unwrap_err();
    assert!(matches!(err, MontageError::Synthesis(_)));
    assert!(matches!(events.as_slice(), [SynthesisEvent::Error { .. }]));
}

#[test]
fn ensure_parent_dir_creates_missing_dirs() {
    let base = std::env::temp_dir().join(format!("montage_parent_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&base);
    let out = base.join("a/b/video.mp4");
    ensure_parent_dir(&out).unwrap();
    assert!(base.join("a/b").is_dir());
    ensure_parent_dir(Path::new("video.mp4")).unwrap();
    let _ = std::fs::remove_dir_all(&base);
}
