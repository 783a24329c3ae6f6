//! Demo performance for the SID synth
//!
//! Renders a short scripted performance to a WAV file, or plays it live on
//! the system audio device when built with the `streaming` feature:
//!
//! ```text
//! sidsynth [OUTPUT.wav] [--model 6581|8580] [--play]
//! ```

use std::env;

use anyhow::{bail, Context, Result};

use sidsynth::synth::parameters::{Global, LfoParam, ListenerSet, ParameterRef, Voice};
use sidsynth::synth::sid_synth::SidSynth;
use sidsynth::synth::{
    StereoFrame, DAC_UPDATE_RATE_HZ, MODULATOR_UPDATE_RATE_HZ, SAMPLE_BLOCK_SIZE,
};
use sidsynth::{ChipModel, Engine, Patch, SoftSid};

enum Action {
    NoteOn(u8, u8),
    NoteOff(u8),
    PitchBend(i16),
    SetGlobal(Global, i32),
    /// Applied to all three voices.
    SetVoiceAll(Voice, i32),
    SetLfo(usize, LfoParam, i32),
}

struct Step {
    at_ms: u32,
    action: Action,
}

fn step(at_ms: u32, action: Action) -> Step {
    Step { at_ms, action }
}

/// A little chord-and-bass performance showing off poly mode, unison glide,
/// vibrato and PWM movement.
fn performance() -> (Vec<Step>, u32) {
    use Action::*;

    let mut steps = vec![
        // Patch setup: pulse oscillators into the low-pass filter.
        step(0, SetVoiceAll(Voice::OscWave, 3)),
        step(0, SetVoiceAll(Voice::OscPwm, 2048)),
        step(0, SetVoiceAll(Voice::EnvAttack, 1)),
        step(0, SetVoiceAll(Voice::EnvDecay, 6)),
        step(0, SetVoiceAll(Voice::EnvSustain, 10)),
        step(0, SetVoiceAll(Voice::EnvRelease, 7)),
        step(0, SetGlobal(Global::FilterMode, 1)),
        step(0, SetGlobal(Global::FilterFreq, 720)),
        step(0, SetGlobal(Global::FilterRes, 8)),
        step(0, SetGlobal(Global::FilterVoice1Enable, 1)),
        step(0, SetGlobal(Global::FilterVoice2Enable, 1)),
        step(0, SetGlobal(Global::FilterVoice3Enable, 1)),
        // LFO 1: slow sine vibrato on all voices.
        step(0, SetLfo(0, LfoParam::Rate, 84)),
        step(0, SetLfo(0, LfoParam::Shape, 3)),
        step(0, SetVoiceAll(Voice::FreqModSrc, 1)),
        step(0, SetVoiceAll(Voice::FreqModDepth, 5)),
        // LFO 2: triangle on pulse width.
        step(0, SetLfo(1, LfoParam::Rate, 52)),
        step(0, SetLfo(1, LfoParam::Shape, 0)),
        step(0, SetVoiceAll(Voice::PwmModSrc, 2)),
        step(0, SetVoiceAll(Voice::PwmModDepth, 180)),
    ];

    // Chord progression in poly mode: Am, F, C, G.
    let chords: [[u8; 3]; 4] = [[57, 60, 64], [53, 57, 60], [48, 52, 55], [55, 59, 62]];
    let mut t = 400;
    for chord in chords {
        for note in chord {
            steps.push(step(t, NoteOn(note, 100)));
        }
        for note in chord {
            steps.push(step(t + 1100, NoteOff(note)));
        }
        t += 1400;
    }

    // Switch to unison with glide for a bass line.
    steps.push(step(t, SetGlobal(Global::VoiceMode, 1)));
    steps.push(step(t, SetVoiceAll(Voice::GlideRate, 44)));
    steps.push(step(t, SetVoiceAll(Voice::EnvSustain, 12)));
    let bass: [u8; 5] = [36, 43, 41, 38, 36];
    for (i, note) in bass.iter().enumerate() {
        // Legato: each note starts before the previous one is released, so
        // the voices glide instead of retriggering.
        steps.push(step(t + i as u32 * 800, NoteOn(*note, 110)));
        if i > 0 {
            steps.push(step(t + i as u32 * 800 + 50, NoteOff(bass[i - 1])));
        }
    }
    t += bass.len() as u32 * 800;

    // Bend the final note up and let it ring out.
    steps.push(step(t, PitchBend(2048)));
    steps.push(step(t + 600, PitchBend(0)));
    steps.push(step(t + 1200, NoteOff(bass[bass.len() - 1])));

    (steps, t + 2400)
}

fn apply_action(synth: &mut SidSynth, engine: Option<&mut Engine<SoftSid>>, action: &Action) {
    match action {
        Action::NoteOn(note, velocity) => synth.note_on(*note, *velocity),
        Action::NoteOff(note) => synth.note_off(*note),
        Action::PitchBend(bend) => synth.set_pitch_bend(*bend),
        Action::SetGlobal(parameter, value) => {
            if let Some(p) = synth
                .patch_mut()
                .parameters
                .mutable_value(ParameterRef::Global(*parameter))
            {
                p.set(*value);
            }
            let mut listeners = ListenerSet::default();
            listeners.register(synth);
            if let Some(engine) = engine {
                listeners.register(engine);
            }
            listeners.notify_global(*parameter);
        }
        Action::SetVoiceAll(parameter, value) => {
            for voice in 0..3 {
                if let Some(p) = synth
                    .patch_mut()
                    .parameters
                    .mutable_voice_value(ParameterRef::Voice(*parameter), voice)
                {
                    p.set(*value);
                }
            }
        }
        Action::SetLfo(lfo, parameter, value) => {
            if let Some(p) = synth
                .patch_mut()
                .parameters
                .mutable_lfo_value(ParameterRef::Lfo(*parameter), *lfo)
            {
                p.set(*value);
            }
        }
    }
}

fn ms_to_block(at_ms: u32) -> usize {
    (at_ms as f32 / 1000.0 * MODULATOR_UPDATE_RATE_HZ) as usize
}

fn render_performance(
    steps: &[Step],
    duration_ms: u32,
    chip_model: ChipModel,
) -> Vec<StereoFrame> {
    let mut synth = SidSynth::new(Patch::default());
    let mut engine = Engine::new(SoftSid::new(), chip_model, DAC_UPDATE_RATE_HZ);

    let total_blocks = ms_to_block(duration_ms);
    let mut frames = Vec::with_capacity(total_blocks * SAMPLE_BLOCK_SIZE);
    let mut block = [StereoFrame::default(); SAMPLE_BLOCK_SIZE];
    let mut next_step = 0;

    for block_index in 0..total_blocks {
        while next_step < steps.len() && ms_to_block(steps[next_step].at_ms) <= block_index {
            apply_action(&mut synth, Some(&mut engine), &steps[next_step].action);
            next_step += 1;
        }
        synth.update();
        engine.refresh(&synth.patch().parameters);
        engine.render_block(&mut block, synth.register_map());
        frames.extend_from_slice(&block);
    }
    frames
}

fn write_wav(path: &str, frames: &[StereoFrame]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: DAC_UPDATE_RATE_HZ,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("creating {path}"))?;
    for frame in frames {
        writer.write_sample(frame.left)?;
        writer.write_sample(frame.right)?;
    }
    writer.finalize().context("finalizing WAV")?;
    Ok(())
}

#[cfg(feature = "streaming")]
fn play_live(steps: &[Step], duration_ms: u32, chip_model: ChipModel) -> Result<()> {
    use std::time::{Duration, Instant};

    use sidsynth::{StreamConfig, SynthStream};

    let synth = SidSynth::new(Patch::default());
    let engine = Engine::new(SoftSid::new(), chip_model, DAC_UPDATE_RATE_HZ);
    let stream = SynthStream::start(synth, engine, StreamConfig::default())?;

    let started = Instant::now();
    for s in steps {
        let due = Duration::from_millis(s.at_ms as u64);
        if let Some(wait) = due.checked_sub(started.elapsed()) {
            std::thread::sleep(wait);
        }
        let synth = stream.synth();
        let mut synth = synth.lock();
        apply_action(&mut synth, None, &s.action);
    }
    if let Some(wait) = Duration::from_millis(duration_ms as u64).checked_sub(started.elapsed()) {
        std::thread::sleep(wait);
    }

    let stats = stream.stats();
    stream.shutdown();
    println!(
        "Playback complete: {} blocks, {} overruns",
        stats.blocks_rendered, stats.overrun_count
    );
    Ok(())
}

fn main() -> Result<()> {
    let mut output = "sidsynth-demo.wav".to_string();
    let mut chip_model = ChipModel::Mos6581;
    let mut live = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--model" => {
                chip_model = match args.next().as_deref() {
                    Some("6581") => ChipModel::Mos6581,
                    Some("8580") => ChipModel::Mos8580,
                    other => bail!("unknown chip model {other:?}, expected 6581 or 8580"),
                };
            }
            "--play" => live = true,
            "--help" | "-h" => {
                println!("Usage: sidsynth [OUTPUT.wav] [--model 6581|8580] [--play]");
                return Ok(());
            }
            path => output = path.to_string(),
        }
    }

    let (steps, duration_ms) = performance();

    if live {
        #[cfg(feature = "streaming")]
        {
            println!("Playing live ({chip_model:?}, {duration_ms} ms)");
            return play_live(&steps, duration_ms, chip_model);
        }
        #[cfg(not(feature = "streaming"))]
        bail!(
            "live playback requires the \"streaming\" feature; rebuild with `--features streaming`"
        );
    }

    println!(
        "Rendering {} steps over {:.1} s ({:?})",
        steps.len(),
        duration_ms as f32 / 1000.0,
        chip_model
    );
    let frames = render_performance(&steps, duration_ms, chip_model);
    write_wav(&output, &frames)?;
    println!(
        "Wrote {} ({:.1} s of audio)",
        output,
        frames.len() as f32 / DAC_UPDATE_RATE_HZ as f32
    );
    Ok(())
}
