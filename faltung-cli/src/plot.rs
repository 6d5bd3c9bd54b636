use std::path::{Path, PathBuf};

use faltung_core::{
    pipeline::{Comparison, Visualizer},
    Error, Recording, Sequence,
};
use plotters::{coord::Shift, prelude::*};

const SIZE: (u32, u32) = (1280, 960);

/// Writes every plot as a PNG file into a directory.
pub struct Plotter {
    dir: PathBuf,
}

impl Plotter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, title: &str) -> PathBuf {
        let name: String = title
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' => c.to_ascii_lowercase(),
                _ => '_',
            })
            .collect();

        self.dir.join(format!("{name}.png"))
    }
}

impl Visualizer for Plotter {
    fn comparison(&mut self, comparison: &Comparison) -> Result<(), Error> {
        let path = self.path("convolution");
        plot_comparison(&path, comparison).map_err(|e| Error::Visualizer(e.into()))?;

        tracing::info!("convolution plot written to {}", path.display());
        Ok(())
    }

    fn waveform(&mut self, title: &str, recording: &Recording) -> Result<(), Error> {
        let path = self.path(title);
        plot_waveform(&path, title, recording).map_err(|e| Error::Visualizer(e.into()))?;

        tracing::info!("waveform written to {}", path.display());
        Ok(())
    }
}

fn plot_comparison(path: &Path, comparison: &Comparison) -> anyhow::Result<()> {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let areas = root.split_evenly((2, 2));
    let plots = [
        ("X Vector", &comparison.x),
        ("Y Vector", &comparison.y),
        ("Convolution of x and y (direct)", &comparison.direct),
        ("Convolution of x and y (reference)", &comparison.reference),
    ];

    for (area, (title, sequence)) in areas.iter().zip(plots) {
        plot_stems(area, title, sequence)?;
    }

    root.present()?;

    Ok(())
}

fn plot_stems(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    title: &str,
    sequence: &Sequence,
) -> anyhow::Result<()> {
    let axis = sequence.axis();
    let (min, max) = value_range(sequence.iter().copied());

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d((axis.start - 1)..axis.end, min..max)?;

    chart
        .configure_mesh()
        .x_desc("n")
        .y_desc("Amplitude")
        .draw()?;

    chart.draw_series(
        sequence
            .stems()
            .map(|(n, v)| PathElement::new(vec![(n, 0.0), (n, v)], &BLUE)),
    )?;
    chart.draw_series(
        sequence
            .stems()
            .map(|(n, v)| Circle::new((n, v), 4, BLUE.filled())),
    )?;

    Ok(())
}

fn plot_waveform(path: &Path, title: &str, recording: &Recording) -> anyhow::Result<()> {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let sample_rate = recording.sample_rate() as f64;
    let seconds = (recording.duration() as f64 / sample_rate).max(1.0 / sample_rate);
    let (min, max) = value_range(recording.iter().map(|s| *s as f64));

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..seconds, min..max)?;

    chart
        .configure_mesh()
        .x_desc("Time [s]")
        .y_desc("Amplitude")
        .draw()?;

    chart.draw_series(LineSeries::new(
        recording
            .iter()
            .enumerate()
            .map(|(n, s)| (n as f64 / sample_rate, *s as f64)),
        &BLUE,
    ))?;

    root.present()?;

    Ok(())
}

/// Value range including zero with a bit of headroom.
fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((0.0f64, 0.0f64), |(min, max), v| (min.min(v), max.max(v)));

    if max - min < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }

    let margin = (max - min) * 0.1;
    (min - margin, max + margin)
}
