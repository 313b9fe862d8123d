use crate::{
    models::{ImageDto, Page, PageDto, RoutesDto, User, UserDto},
    tree::PageNode,
};

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        UserDto {
            id: user.id,
            created_at: user.created_at,
            updated_at: user.updated_at,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_active: user.is_active,
        }
    }
}

pub fn image_dto(file_name: &str, base_url: &str) -> ImageDto {
    ImageDto {
        id: file_name.to_string(),
        url: format!("{}/{}", base_url, file_name),
    }
}

/// A page without relations (`parent: None`, no children).
pub fn page_dto(page: &Page, base_url: &str) -> PageDto {
    PageDto {
        id: page.id,
        created_at: page.created_at,
        updated_at: page.updated_at,
        title: page.title.clone(),
        url_slug: page.url_slug.clone(),
        published_at: page.published_at,
        content: page.content.clone(),
        sort: page.sort,
        parent: None,
        children: Vec::new(),
        is_active: page.is_active,
        page_type: page.page_type,
        images: page
            .images
            .iter()
            .map(|file| image_dto(file, base_url))
            .collect(),
    }
}

/// page_with_relations
///
/// A page with its direct parent and direct children, both shallow. Children are
/// expected in sibling order.
pub fn page_with_relations(
    page: &Page,
    parent: Option<&Page>,
    children: &[Page],
    base_url: &str,
) -> PageDto {
    PageDto {
        parent: parent.map(|p| Box::new(page_dto(p, base_url))),
        children: children.iter().map(|c| page_dto(c, base_url)).collect(),
        ..page_dto(page, base_url)
    }
}

fn route_dto(page: &Page) -> RoutesDto {
    RoutesDto {
        id: page.id,
        title: page.title.clone(),
        url_slug: page.url_slug.clone(),
        sort: page.sort,
        page_type: page.page_type,
        parent: None,
        children: Vec::new(),
    }
}

/// routes_from_forest
///
/// Navigation projection of a forest: every node carries its full subtree and a
/// shallow reference to its parent.
pub fn routes_from_forest(nodes: &[PageNode], parent: Option<&Page>) -> Vec<RoutesDto> {
    nodes
        .iter()
        .map(|node| RoutesDto {
            parent: parent.map(|p| Box::new(route_dto(p))),
            children: routes_from_forest(&node.children, Some(&node.page)),
            ..route_dto(&node.page)
        })
        .collect()
}
