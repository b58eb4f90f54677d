//! 帧布局
//!
//! 把"当前活动命令 + 舞台状态 + 视图状态"转换为按图层排序的绘制列表和选项命中表。
//!
//! 图层顺序固定：背景 → 角色 → 消息框 → 名字框 → 文本 → 选项 → 推进箭头 → 场景编号。

use tracing::warn;

use super::assets::{AssetCatalog, AssetState};
use super::metrics::TextMetrics;
use super::nine_slice::validate_skin;
use super::wrap::wrap_text;
use super::{ChoiceHitTable, DrawCall, DrawOp, FrameDescriptor, HitBox, Layer, Rect, Rgba};
use crate::command::{Command, CommandKind, FrameAnimation};
use crate::error::{AssetError, RuntimeError};
use crate::project::{Project, Scene};
use crate::runtime::Interpreter;
use crate::state::StageState;

/// 消息框
pub const MESSAGE_BOX: Rect = Rect::new(4, 124, 248, 64);
/// 文本相对消息框的内边距
pub const TEXT_PADDING_X: i32 = 8;
pub const TEXT_PADDING_Y: i32 = 6;
/// 名字框高度
pub const NAME_BOX_HEIGHT: u32 = 13;
/// 名字框文本左右内边距之和
pub const NAME_BOX_PADDING: u32 = 8;
/// 角色占位图尺寸
pub const PLACEHOLDER_SIZE: (u32, u32) = (48, 96);

const BOX_FILL: Rgba = Rgba([16, 16, 40, 224]);
const CHOICE_FILL: Rgba = Rgba([48, 48, 96, 224]);
const PLACEHOLDER_FILL: Rgba = Rgba([128, 128, 128, 255]);
const TEXT_COLOR: Rgba = Rgba::WHITE;
const OVERLAY_FILL: Rgba = Rgba([0, 0, 0, 160]);
const OVERLAY_TEXT: Rgba = Rgba([255, 255, 0, 255]);

/// 图层不透明度覆盖（淡入淡出期间由 Player 提供）
///
/// `None` 表示按舞台可见性取 255 或 0。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerOpacity {
    pub background: Option<u8>,
    pub character: Option<u8>,
}

/// 编辑器视图状态
///
/// 只影响画面，不属于任何工程实体。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewState {
    /// 显示场景编号
    pub show_scene_index: bool,
    pub opacity: LayerOpacity,
    /// 角色帧动画时钟（毫秒）
    pub animation_clock_ms: u64,
}

/// 布局输入
#[derive(Debug, Clone, Copy)]
pub struct LayoutInput<'a> {
    pub project: &'a Project,
    pub scene_index: usize,
    /// 当前活动命令（等待中的对话）
    pub active: Option<&'a Command>,
    pub stage: &'a StageState,
    pub view: ViewState,
    /// 是否显示推进箭头
    pub has_following_content: bool,
}

impl<'a> LayoutInput<'a> {
    /// 从解释器当前状态构造布局输入
    pub fn from_interpreter(
        project: &'a Project,
        interpreter: &'a Interpreter,
        view: ViewState,
    ) -> Result<Self, RuntimeError> {
        Ok(Self {
            project,
            scene_index: interpreter.scene_index(),
            active: interpreter.active_command(project)?,
            stage: &interpreter.state().stage,
            view,
            has_following_content: interpreter.has_following_content(project),
        })
    }
}

/// 选项行几何：(行高, 行间距)
pub fn choice_row_metrics(choice_count: usize) -> (u32, u32) {
    if choice_count <= 3 { (14, 2) } else { (10, 1) }
}

/// 生成一帧的绘制列表
pub fn layout_frame(
    input: &LayoutInput<'_>,
    assets: &impl AssetCatalog,
    metrics: &impl TextMetrics,
) -> Result<FrameDescriptor, RuntimeError> {
    let scene = input.project.scene(input.scene_index)?;
    let mut builder = FrameBuilder::new(input.project.width(), input.project.height());

    builder.background(scene, input, assets);
    builder.character(scene, input, assets);

    if let Some(Command {
        kind: CommandKind::Dialogue {
            speaker,
            text,
            choices,
        },
        ..
    }) = input.active
    {
        let skins = &input.project.settings;
        builder.skinned_box(
            Layer::MessageBox,
            skins.message_box_image.as_deref(),
            MESSAGE_BOX,
            BOX_FILL,
            assets,
        );

        if !speaker.is_empty() {
            let name_box = Rect::new(
                MESSAGE_BOX.x,
                MESSAGE_BOX.y - NAME_BOX_HEIGHT as i32,
                metrics.measure(speaker) + NAME_BOX_PADDING,
                NAME_BOX_HEIGHT,
            );
            builder.skinned_box(
                Layer::NameBox,
                skins.name_box_image.as_deref(),
                name_box,
                BOX_FILL,
                assets,
            );
            builder.push(
                Layer::NameBox,
                DrawOp::Text {
                    text: speaker.clone(),
                    x: name_box.x + (NAME_BOX_PADDING / 2) as i32,
                    y: centered(name_box, metrics.line_height()),
                    color: TEXT_COLOR,
                },
            );
        }

        let text_x = MESSAGE_BOX.x + TEXT_PADDING_X;
        let text_y = MESSAGE_BOX.y + TEXT_PADDING_Y;
        let budget = MESSAGE_BOX.width - 2 * TEXT_PADDING_X as u32;
        let line_height = metrics.line_height() as i32;
        let lines = wrap_text(text, budget, metrics);
        for (i, line) in lines.iter().enumerate() {
            builder.push(
                Layer::Text,
                DrawOp::Text {
                    text: line.clone(),
                    x: text_x,
                    y: text_y + i as i32 * line_height,
                    color: TEXT_COLOR,
                },
            );
        }

        if choices.is_empty() {
            if input.has_following_content {
                builder.push(
                    Layer::AdvanceArrow,
                    DrawOp::AdvanceArrow {
                        x: MESSAGE_BOX.right() - 12,
                        y: MESSAGE_BOX.bottom() - 9,
                        color: TEXT_COLOR,
                    },
                );
            }
        } else {
            let (row_height, spacing) = choice_row_metrics(choices.len());
            let start_y = text_y + lines.len() as i32 * line_height + 2;
            for (i, choice) in choices.iter().enumerate() {
                let row = Rect::new(
                    text_x,
                    start_y + i as i32 * (row_height + spacing) as i32,
                    budget,
                    row_height,
                );
                builder.skinned_box(
                    Layer::Choices,
                    skins.choice_box_image.as_deref(),
                    row,
                    CHOICE_FILL,
                    assets,
                );
                builder.push(
                    Layer::Choices,
                    DrawOp::Text {
                        text: choice.text.clone(),
                        x: row.x + 4,
                        y: centered(row, metrics.line_height()),
                        color: TEXT_COLOR,
                    },
                );
                builder.hit_table.boxes.push(HitBox {
                    rect: row,
                    choice_index: i,
                });
            }
        }
    }

    if input.view.show_scene_index {
        let label = format!("#{}", input.scene_index);
        let width = metrics.measure(&label) + 4;
        builder.push(
            Layer::SceneIndex,
            DrawOp::Fill {
                rect: Rect::new(0, 0, width, metrics.line_height() + 2),
                color: OVERLAY_FILL,
            },
        );
        builder.push(
            Layer::SceneIndex,
            DrawOp::Text {
                text: label,
                x: 2,
                y: 1,
                color: OVERLAY_TEXT,
            },
        );
    }

    Ok(builder.finish())
}

/// 行框在矩形内纵向居中时的顶部坐标（行框比矩形高时贴顶）
fn centered(rect: Rect, line_height: u32) -> i32 {
    rect.y + (rect.height.saturating_sub(line_height) / 2) as i32
}

/// 按舞台可见性和视图覆盖计算图层不透明度
fn effective_opacity(visible: bool, over: Option<u8>) -> u8 {
    over.unwrap_or(if visible { 255 } else { 0 })
}

struct FrameBuilder {
    width: u32,
    height: u32,
    calls: Vec<DrawCall>,
    hit_table: ChoiceHitTable,
    degraded: Vec<AssetError>,
}

impl FrameBuilder {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            calls: Vec::new(),
            hit_table: ChoiceHitTable::default(),
            degraded: Vec::new(),
        }
    }

    fn push(&mut self, layer: Layer, op: DrawOp) {
        self.calls.push(DrawCall { layer, op });
    }

    fn canvas(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    fn degrade(&mut self, error: AssetError) {
        warn!(error = %error, "资源降级");
        self.degraded.push(error);
    }

    fn background(&mut self, scene: &Scene, input: &LayoutInput<'_>, assets: &impl AssetCatalog) {
        let canvas = self.canvas();
        self.push(
            Layer::Background,
            DrawOp::Fill {
                rect: canvas,
                color: Rgba::BLACK,
            },
        );

        let opacity = effective_opacity(input.stage.background_visible, input.view.opacity.background);
        if opacity == 0 {
            return;
        }
        let color = DrawOp::Fill {
            rect: canvas,
            color: Rgba::from_hex(&scene.background_color).with_opacity(opacity),
        };

        let Some(id) = scene.background_id.as_deref() else {
            self.push(Layer::Background, color);
            return;
        };
        match assets.image(id) {
            AssetState::Ready(image) => {
                let (w, h) = image.dimensions();
                self.push(
                    Layer::Background,
                    DrawOp::Image {
                        handle: id.to_string(),
                        src: Rect::new(0, 0, w, h),
                        dest: canvas,
                        opacity,
                    },
                );
            }
            AssetState::Pending => self.push(
                Layer::Background,
                DrawOp::Image {
                    handle: id.to_string(),
                    src: canvas,
                    dest: canvas,
                    opacity,
                },
            ),
            AssetState::Failed(message) => {
                self.degrade(AssetError::AssetLoadFailure {
                    handle: id.to_string(),
                    message: message.to_string(),
                });
                self.push(Layer::Background, color);
            }
        }
    }

    fn character(&mut self, scene: &Scene, input: &LayoutInput<'_>, assets: &impl AssetCatalog) {
        let Some(id) = scene.character_id.as_deref() else {
            return;
        };
        let opacity = effective_opacity(input.stage.character_visible, input.view.opacity.character);
        if opacity == 0 {
            return;
        }

        match assets.image(id) {
            AssetState::Ready(image) => {
                let src = sprite_source(
                    image.dimensions(),
                    input.stage.character_animation.as_ref(),
                    input.view.animation_clock_ms,
                );
                let dest = self.stand(src.width, src.height);
                self.push(
                    Layer::Character,
                    DrawOp::Image {
                        handle: id.to_string(),
                        src,
                        dest,
                        opacity,
                    },
                );
            }
            AssetState::Pending => {
                let dest = self.stand(PLACEHOLDER_SIZE.0, PLACEHOLDER_SIZE.1);
                self.push(
                    Layer::Character,
                    DrawOp::Image {
                        handle: id.to_string(),
                        src: Rect::new(0, 0, dest.width, dest.height),
                        dest,
                        opacity,
                    },
                );
            }
            AssetState::Failed(message) => {
                self.degrade(AssetError::AssetLoadFailure {
                    handle: id.to_string(),
                    message: message.to_string(),
                });
                let dest = self.stand(PLACEHOLDER_SIZE.0, PLACEHOLDER_SIZE.1);
                self.push(
                    Layer::Character,
                    DrawOp::Fill {
                        rect: dest,
                        color: PLACEHOLDER_FILL.with_opacity(opacity),
                    },
                );
            }
        }
    }

    /// 水平居中、底部对齐
    fn stand(&self, width: u32, height: u32) -> Rect {
        Rect::new(
            (self.width as i32 - width as i32) / 2,
            self.height as i32 - height as i32,
            width,
            height,
        )
    }

    /// 九宫格皮肤；没有皮肤、尺寸不对或加载失败时降级为纯色矩形
    fn skinned_box(
        &mut self,
        layer: Layer,
        skin: Option<&str>,
        dest: Rect,
        fallback: Rgba,
        assets: &impl AssetCatalog,
    ) {
        let flat = DrawOp::Fill {
            rect: dest,
            color: fallback,
        };
        let Some(handle) = skin else {
            self.push(layer, flat);
            return;
        };

        let nine_slice = DrawOp::NineSlice {
            handle: handle.to_string(),
            dest,
        };
        match assets.image(handle) {
            AssetState::Ready(image) => match validate_skin(handle, image) {
                Ok(()) => self.push(layer, nine_slice),
                Err(e) => {
                    self.degrade(e);
                    self.push(layer, flat);
                }
            },
            AssetState::Pending => self.push(layer, nine_slice),
            AssetState::Failed(message) => {
                self.degrade(AssetError::AssetLoadFailure {
                    handle: handle.to_string(),
                    message: message.to_string(),
                });
                self.push(layer, flat);
            }
        }
    }

    fn finish(self) -> FrameDescriptor {
        FrameDescriptor {
            width: self.width,
            height: self.height,
            calls: self.calls,
            hit_table: self.hit_table,
            degraded: self.degraded,
        }
    }
}

/// 精灵表当前帧的源矩形；没有动画时取整张图
fn sprite_source(
    (width, height): (u32, u32),
    animation: Option<&FrameAnimation>,
    clock_ms: u64,
) -> Rect {
    match animation {
        Some(anim) if anim.frame_width > 0 && anim.frame_width <= width => {
            let frame = anim.frame_at(clock_ms);
            let max_frame = width / anim.frame_width - 1;
            let x = frame.min(max_frame) * anim.frame_width;
            Rect::new(x as i32, 0, anim.frame_width, height)
        }
        _ => Rect::new(0, 0, width, height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Choice;
    use crate::render::{AssetStore, FixedMetrics};
    use image::RgbaImage;

    fn project_with(scene: Scene) -> Project {
        Project {
            scenes: vec![scene],
            ..Project::default()
        }
    }

    fn layout(
        project: &Project,
        active: Option<&Command>,
        assets: &AssetStore,
        view: ViewState,
    ) -> FrameDescriptor {
        let stage = StageState::for_scene(&project.scenes[0]);
        let input = LayoutInput {
            project,
            scene_index: 0,
            active,
            stage: &stage,
            view,
            has_following_content: true,
        };
        layout_frame(&input, assets, &FixedMetrics::default()).unwrap()
    }

    #[test]
    fn test_layer_order_with_speaker_and_arrow() {
        let mut scene = Scene::new("s");
        scene.character_id = Some("hero".to_string());
        let project = project_with(scene);
        let dialogue = Command::dialogue("d", "Alice", "Hello there");
        let view = ViewState {
            show_scene_index: true,
            ..ViewState::default()
        };
        let desc = layout(&project, Some(&dialogue), &AssetStore::new(), view);
        assert_eq!(
            desc.layers(),
            vec![
                Layer::Background,
                Layer::Character,
                Layer::MessageBox,
                Layer::NameBox,
                Layer::Text,
                Layer::AdvanceArrow,
                Layer::SceneIndex,
            ]
        );
        // 角色图未注册 -> 占位图
        assert_eq!(desc.degraded.len(), 1);
    }

    #[test]
    fn test_name_box_geometry() {
        let project = project_with(Scene::new("s"));
        let dialogue = Command::dialogue("d", "Bob", "hi");
        let desc = layout(&project, Some(&dialogue), &AssetStore::new(), ViewState::default());
        let name_box = desc
            .layer_ops(Layer::NameBox)
            .find_map(|op| match op {
                DrawOp::Fill { rect, .. } => Some(*rect),
                _ => None,
            })
            .unwrap();
        assert_eq!(name_box, Rect::new(4, 111, 26, 13));
    }

    #[test]
    fn test_narration_has_no_name_box() {
        let project = project_with(Scene::new("s"));
        let dialogue = Command::dialogue("d", "", "……");
        let desc = layout(&project, Some(&dialogue), &AssetStore::new(), ViewState::default());
        assert_eq!(desc.layer_ops(Layer::NameBox).count(), 0);
    }

    #[test]
    fn test_choice_rows_match_hit_table() {
        let project = project_with(Scene::new("s"));
        let dialogue = Command::choice_dialogue(
            "q",
            "",
            "Pick",
            vec![Choice::new("a"), Choice::new("b")],
        );
        let desc = layout(&project, Some(&dialogue), &AssetStore::new(), ViewState::default());

        let rows: Vec<Rect> = desc
            .layer_ops(Layer::Choices)
            .filter_map(|op| match op {
                DrawOp::Fill { rect, .. } => Some(*rect),
                _ => None,
            })
            .collect();
        let hits: Vec<Rect> = desc.hit_table.boxes.iter().map(|b| b.rect).collect();
        assert_eq!(rows, hits);
        // textY = 130, 一行文本 -> 起点 130 + 12 + 2
        assert_eq!(rows[0], Rect::new(12, 144, 232, 14));
        assert_eq!(rows[1], Rect::new(12, 160, 232, 14));
        // 有选项时没有推进箭头
        assert_eq!(desc.layer_ops(Layer::AdvanceArrow).count(), 0);
    }

    #[test]
    fn test_malformed_skin_degrades_to_flat() {
        let mut project = project_with(Scene::new("s"));
        project.settings.message_box_image = Some("skin".to_string());
        let mut assets = AssetStore::new();
        assets.insert("skin", RgbaImage::new(24, 24));
        let dialogue = Command::dialogue("d", "", "x");
        let desc = layout(&project, Some(&dialogue), &assets, ViewState::default());
        assert!(matches!(
            desc.layer_ops(Layer::MessageBox).next(),
            Some(DrawOp::Fill { .. })
        ));
        assert!(matches!(
            desc.degraded[0],
            AssetError::MalformedNinePatchAsset { width: 24, .. }
        ));

        assets.insert("skin", RgbaImage::new(16, 16));
        let desc = layout(&project, Some(&dialogue), &assets, ViewState::default());
        assert!(matches!(
            desc.layer_ops(Layer::MessageBox).next(),
            Some(DrawOp::NineSlice { .. })
        ));
        assert!(desc.degraded.is_empty());
    }

    #[test]
    fn test_sprite_sheet_frame() {
        let anim = FrameAnimation {
            frame_count: 4,
            frame_width: 32,
            frame_duration_ms: 100,
            looping: true,
        };
        assert_eq!(sprite_source((128, 64), Some(&anim), 250), Rect::new(64, 0, 32, 64));
        assert_eq!(sprite_source((128, 64), None, 250), Rect::new(0, 0, 128, 64));
    }

    #[test]
    fn test_hidden_background_draws_only_black() {
        let project = project_with(Scene::new("s"));
        let mut stage = StageState::for_scene(&project.scenes[0]);
        stage.background_visible = false;
        let input = LayoutInput {
            project: &project,
            scene_index: 0,
            active: None,
            stage: &stage,
            view: ViewState::default(),
            has_following_content: false,
        };
        let desc = layout_frame(&input, &AssetStore::new(), &FixedMetrics::default()).unwrap();
        assert_eq!(desc.calls.len(), 1);
        assert!(desc.hit_table.is_empty());
    }

    #[test]
    fn test_out_of_range_scene_is_error() {
        let project = Project::default();
        let stage = StageState::default();
        let input = LayoutInput {
            project: &project,
            scene_index: 0,
            active: None,
            stage: &stage,
            view: ViewState::default(),
            has_following_content: false,
        };
        assert!(matches!(
            layout_frame(&input, &AssetStore::new(), &FixedMetrics::default()),
            Err(RuntimeError::SceneIndexOutOfRange { .. })
        ));
    }
}
