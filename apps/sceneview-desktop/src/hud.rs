use egui::Context as EguiContext;
use sceneview_scene::FrameState;

/// Per-frame numbers shown next to the frame state.
pub struct HudStats<'a> {
    pub adapter: &'a str,
    pub objects: usize,
    pub samples: u32,
}

pub fn draw_hud(ctx: &EguiContext, frame: &FrameState, stats: &HudStats) {
    if !frame.show_hud {
        return;
    }
    let camera = &frame.camera;
    let light = frame.light_position;

    egui::Window::new("sceneview")
        .anchor(egui::Align2::LEFT_TOP, [8.0, 8.0])
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            ui.label(stats.adapter);
            ui.label(format!(
                "Frame: {:.2} ms  MSAA: {}x",
                frame.elapsed_seconds * 1000.0,
                stats.samples
            ));
            ui.separator();
            ui.label(format!(
                "Camera: ({:.2}, {:.2}, {:.2})",
                camera.position.x, camera.position.y, camera.position.z
            ));
            ui.label(format!("Yaw {:.1}°  Pitch {:.1}°", camera.yaw(), camera.pitch()));
            ui.label(format!("Light: ({:.2}, {:.2}, {:.2})", light.x, light.y, light.z));
            ui.label(format!("Objects: {}  Mode: {}", stats.objects, frame.draw_mode.label()));
            ui.separator();
            ui.small("WASD/Space/Shift: move | Ctrl: fast | Numpad: light");
            ui.small(", : draw mode | F1: HUD | Esc: quit");
        });
}
