//! Full-grid composite benchmarks.
//! Run: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glyphfield::export::frame_text;
use glyphfield::render::RenderState;
use glyphfield::schema::{
    BlendMode, GridSpec, InteractiveConfig, PatternConfig, PatternKind, Scene, SecondaryConfig,
};

fn scene(primary: PatternKind, secondary: Option<PatternKind>) -> Scene {
    let grid = GridSpec::new(80, 40).expect("grid");
    let mut scene = Scene::new(grid, PatternConfig::new(primary).with_glow(true));
    scene.seed = Some(7);
    if let Some(kind) = secondary {
        scene.secondary = SecondaryConfig {
            enabled: true,
            pattern: PatternConfig::new(kind),
        };
        scene.blend.mode = BlendMode::Screen;
    }
    scene
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_frame");
    group.sample_size(50);

    for kind in [PatternKind::Waves, PatternKind::Noise, PatternKind::Mandelbrot] {
        let mut state = RenderState::new(scene(kind, None));
        group.bench_function(format!("80x40_{}", kind.as_str()), |b| {
            b.iter(|| black_box(state.tick(1.0 / 60.0)));
        });
    }

    let mut blended = RenderState::new(scene(PatternKind::Plasma, Some(PatternKind::Voronoi)));
    blended.set_interactive(InteractiveConfig {
        enabled: true,
        ..InteractiveConfig::default()
    });
    blended.arm();
    blended.pointer_move(0.5, 0.5);
    group.bench_function("80x40_plasma_voronoi_interactive", |b| {
        b.iter(|| {
            let frame = blended.tick(1.0 / 60.0).expect("tick");
            black_box(frame_text(&frame))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
