//! Dynamic rendering attachment setup (Vulkan 1.3).
//!
//! The passes never create `VkRenderPass` objects; each one describes its
//! attachments with [`RenderingConfig`] and begins rendering from the
//! resulting [`RenderingInfoBundle`]. The bundle exists because
//! `vk::RenderingInfo` borrows its attachment arrays; it owns those arrays
//! so the info stays valid for the duration of `begin_rendering`.
//!
//! Defaults match the common case: color attachments clear to opaque black
//! and store, depth clears to 1.0 and is discarded. Passes whose depth is
//! read afterwards (shadow map, G-buffer depth) chain
//! [`DepthAttachment::store`]; the composition pass chains
//! [`DepthAttachment::load`] to keep the depth it was handed.

use ash::vk;

/// One color target of a rendering operation.
#[derive(Clone)]
pub struct ColorAttachment {
    /// View to render into.
    pub image_view: vk::ImageView,
    /// Load operation; `CLEAR` by default.
    pub load_op: vk::AttachmentLoadOp,
    /// Store operation; `STORE` by default.
    pub store_op: vk::AttachmentStoreOp,
    /// Clear color used when `load_op` is `CLEAR`.
    pub clear_value: vk::ClearColorValue,
}

impl ColorAttachment {
    /// A clearing, storing attachment over `image_view`.
    #[inline]
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }
    }

    /// Preserve the existing contents instead of clearing.
    #[inline]
    pub fn load(mut self) -> Self {
        self.load_op = vk::AttachmentLoadOp::LOAD;
        self
    }

    /// Discard the results after the pass (transient attachments).
    #[inline]
    pub fn dont_store(mut self) -> Self {
        self.store_op = vk::AttachmentStoreOp::DONT_CARE;
        self
    }

    /// Sets the clear color.
    #[inline]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_value = vk::ClearColorValue { float32: color };
        self
    }

    fn attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(vk::ClearValue {
                color: self.clear_value,
            })
    }
}

/// The depth target of a rendering operation.
#[derive(Clone, Debug)]
pub struct DepthAttachment {
    /// View to render into.
    pub image_view: vk::ImageView,
    /// Load operation; `CLEAR` by default.
    pub load_op: vk::AttachmentLoadOp,
    /// Store operation; `DONT_CARE` by default.
    pub store_op: vk::AttachmentStoreOp,
    /// Clear depth used when `load_op` is `CLEAR`.
    pub clear_depth: f32,
}

impl DepthAttachment {
    /// A clearing, discarding depth attachment over `image_view`.
    #[inline]
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            clear_depth: 1.0,
        }
    }

    /// Preserve existing depth instead of clearing.
    #[inline]
    pub fn load(mut self) -> Self {
        self.load_op = vk::AttachmentLoadOp::LOAD;
        self
    }

    /// Keep the depth after the pass, for sampling or copying.
    #[inline]
    pub fn store(mut self) -> Self {
        self.store_op = vk::AttachmentStoreOp::STORE;
        self
    }

    /// Sets the clear depth.
    #[inline]
    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.clear_depth = depth;
        self
    }

    fn attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.clear_depth,
                    stencil: 0,
                },
            })
    }
}

/// Attachments and render area of one rendering operation.
///
/// A depth-only configuration (no color attachments) is valid; the shadow
/// pass renders that way.
#[derive(Clone, Default)]
pub struct RenderingConfig {
    color_attachments: Vec<ColorAttachment>,
    depth_attachment: Option<DepthAttachment>,
    render_area: vk::Rect2D,
}

impl RenderingConfig {
    /// A configuration covering `width` x `height` from the origin.
    #[inline]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            color_attachments: Vec::new(),
            depth_attachment: None,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width, height },
            },
        }
    }

    /// A configuration covering `extent` from the origin.
    #[inline]
    pub fn from_extent(extent: vk::Extent2D) -> Self {
        Self::new(extent.width, extent.height)
    }

    /// Appends one color attachment; order matches the fragment shader's
    /// output locations.
    #[inline]
    pub fn with_color_attachment(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    /// Appends several color attachments in location order.
    #[inline]
    pub fn with_color_attachments(
        mut self,
        attachments: impl IntoIterator<Item = ColorAttachment>,
    ) -> Self {
        self.color_attachments.extend(attachments);
        self
    }

    /// Sets the depth attachment.
    #[inline]
    pub fn with_depth_attachment(mut self, attachment: DepthAttachment) -> Self {
        self.depth_attachment = Some(attachment);
        self
    }

    /// Resolves the configuration into owned attachment infos.
    pub fn build(&self) -> RenderingInfoBundle {
        RenderingInfoBundle {
            color_attachments: self
                .color_attachments
                .iter()
                .map(ColorAttachment::attachment_info)
                .collect(),
            depth_attachment: self
                .depth_attachment
                .as_ref()
                .map(DepthAttachment::attachment_info),
            render_area: self.render_area,
        }
    }
}

/// Owns the attachment arrays a `vk::RenderingInfo` borrows.
pub struct RenderingInfoBundle {
    color_attachments: Vec<vk::RenderingAttachmentInfo<'static>>,
    depth_attachment: Option<vk::RenderingAttachmentInfo<'static>>,
    render_area: vk::Rect2D,
}

impl RenderingInfoBundle {
    /// The rendering info, borrowing this bundle's storage.
    pub fn info(&self) -> vk::RenderingInfo<'_> {
        let mut info = vk::RenderingInfo::default()
            .render_area(self.render_area)
            .layer_count(1)
            .color_attachments(&self.color_attachments);
        if let Some(ref depth) = self.depth_attachment {
            info = info.depth_attachment(depth);
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_attachment_defaults_clear_and_store() {
        let attachment = ColorAttachment::new(vk::ImageView::null());
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(unsafe { attachment.clear_value.float32 }, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_depth_attachment_defaults_discard() {
        let attachment = DepthAttachment::new(vk::ImageView::null());
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(attachment.clear_depth, 1.0);
    }

    #[test]
    fn test_depth_attachment_load_store_chain() {
        // The composition pass keeps the depth it is handed.
        let attachment = DepthAttachment::new(vk::ImageView::null()).load().store();
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
    }

    #[test]
    fn test_depth_only_configuration() {
        let config = RenderingConfig::new(1024, 1024)
            .with_depth_attachment(DepthAttachment::new(vk::ImageView::null()).store());
        let bundle = config.build();
        let info = bundle.info();
        assert_eq!(info.color_attachment_count, 0);
        assert_eq!(info.render_area.extent.width, 1024);
        assert_eq!(info.layer_count, 1);
    }

    #[test]
    fn test_gbuffer_style_configuration() {
        let config = RenderingConfig::from_extent(vk::Extent2D {
            width: 1280,
            height: 720,
        })
        .with_color_attachments((0..5).map(|_| ColorAttachment::new(vk::ImageView::null())))
        .with_depth_attachment(DepthAttachment::new(vk::ImageView::null()).store());

        let bundle = config.build();
        let info = bundle.info();
        assert_eq!(info.color_attachment_count, 5);
        assert_eq!(info.render_area.extent.height, 720);
    }
}
