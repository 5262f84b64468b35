//! Carousel-shape detection over a fetched [`MediaDetail`] (spec §4.4).

use crate::fetchers::detail::MediaDetail;
use crate::models::ContentStyle;

/// `is_carousel` from the union of `media_type==8`, a non-empty
/// `carousel_media`, `product_type == "carousel_container"`, or a non-empty
/// `edge_sidecar_to_children.edges` (spec §4.4). `carousel_video` iff any
/// child looks like a video.
pub fn derive_style(detail: &MediaDetail) -> ContentStyle {
    let is_carousel = detail.media_type_raw == "carousel"
        || !detail.carousel_children.is_empty()
        || detail.product_type_raw == "carousel_container"
        || detail.edge_sidecar_children_count > 0;
    let has_video_child = detail.carousel_children.iter().any(|c| c.media_type_raw == "video");
    let is_video = detail.media_type_raw == "video";

    ContentStyle::derive(is_carousel, is_video, has_video_child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::detail::CarouselChild;

    fn detail(media_type: &str, children: Vec<CarouselChild>, product_type: &str) -> MediaDetail {
        MediaDetail {
            media_type_raw: media_type.to_string(),
            carousel_children: children,
            product_type_raw: product_type.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn edge_sidecar_to_children_alone_is_detected_as_carousel() {
        let mut detail = detail("unknown(0)", vec![], "feed");
        detail.edge_sidecar_children_count = 3;
        assert_eq!(derive_style(&detail), ContentStyle::CarouselImage);
    }

    #[test]
    fn plain_video_is_video() {
        assert_eq!(derive_style(&detail("video", vec![], "feed")), ContentStyle::Video);
    }

    #[test]
    fn plain_image_is_image() {
        assert_eq!(derive_style(&detail("image", vec![], "feed")), ContentStyle::Image);
    }

    #[test]
    fn carousel_with_all_image_children_is_carousel_image() {
        let children = vec![CarouselChild { media_type_raw: "image".into(), image_url: None }];
        assert_eq!(derive_style(&detail("carousel", children, "feed")), ContentStyle::CarouselImage);
    }

    #[test]
    fn carousel_with_a_video_child_is_carousel_video() {
        let children = vec![
            CarouselChild { media_type_raw: "image".into(), image_url: None },
            CarouselChild { media_type_raw: "video".into(), image_url: None },
        ];
        assert_eq!(derive_style(&detail("carousel", children, "feed")), ContentStyle::CarouselVideo);
    }

    #[test]
    fn product_type_carousel_container_is_detected_even_without_media_type() {
        assert_eq!(derive_style(&detail("unknown(0)", vec![], "carousel_container")), ContentStyle::CarouselImage);
    }
}
