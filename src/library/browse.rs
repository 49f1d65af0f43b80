// src/library/browse.rs
use std::cmp::Ordering;
use std::path::PathBuf;

use itertools::Itertools;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;

use super::title::find_year_in_str;
use super::{ItemKey, Library, MediaItem, MediaKind, Metadata};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Category {
    #[default]
    All,
    Movies,
    Series,
    Favorites,
}

impl Category {
    pub const ALL: [Self; 4] = [Self::All, Self::Movies, Self::Series, Self::Favorites];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Movies => "movies",
            Self::Series => "series",
            Self::Favorites => "fav",
        }
    }
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "movies" => Some(Self::Movies),
            "series" => Some(Self::Series),
            "fav" | "favorites" => Some(Self::Favorites),
            _ => None,
        }
    }
    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Movies => "Movies",
            Self::Series => "Series",
            Self::Favorites => "Favorites",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Added,
    Rating,
    Title,
    YearNewest,
    YearOldest,
}

impl SortKey {
    pub const ALL: [Self; 5] = [
        Self::Added,
        Self::Rating,
        Self::Title,
        Self::YearNewest,
        Self::YearOldest,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Rating => "rating",
            Self::Title => "title",
            Self::YearNewest => "year_desc",
            Self::YearOldest => "year_asc",
        }
    }
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "added" => Some(Self::Added),
            "rating" => Some(Self::Rating),
            "title" | "name" => Some(Self::Title),
            "year_desc" => Some(Self::YearNewest),
            "year_asc" => Some(Self::YearOldest),
            _ => None,
        }
    }
    pub const fn label(self) -> &'static str {
        match self {
            Self::Added => "Recently scanned",
            Self::Rating => "Rating",
            Self::Title => "Name (A-Z)",
            Self::YearNewest => "Year (newest)",
            Self::YearOldest => "Year (oldest)",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrowseQuery {
    pub category: Category,
    pub search: String,
    pub genre: Option<String>,
    pub sort: SortKey,
}

/// One grid tile: a movie, or a whole series.
#[derive(Clone, Debug, Serialize)]
pub struct Card {
    pub key: ItemKey,
    pub kind: MediaKind,
    pub title: String,
    pub year: Option<String>,
    pub rating: Option<String>,
    pub plot: Option<String>,
    pub genre: Option<String>,
    pub favorite: bool,
    pub has_poster: bool,
    pub episode_count: usize,
    #[serde(skip)]
    pub poster: Option<PathBuf>,
    #[serde(skip)]
    pub order: usize,
}

impl Card {
    fn new(
        key: ItemKey,
        kind: MediaKind,
        title: &str,
        file_year: Option<i32>,
        metadata: &Metadata,
        favorite: bool,
        order: usize,
    ) -> Self {
        let poster = metadata.poster.clone().filter(|p| p.exists());
        Self {
            key,
            kind,
            title: title.to_string(),
            year: metadata
                .year
                .clone()
                .or_else(|| file_year.map(|y| y.to_string())),
            rating: metadata.rating.clone(),
            plot: metadata.plot.clone(),
            genre: metadata.genre.clone(),
            favorite,
            has_poster: poster.is_some(),
            episode_count: 0,
            poster,
            order,
        }
    }

    pub fn rating_value(&self) -> Option<f32> {
        self.rating.as_deref().and_then(|r| r.trim().parse().ok())
    }

    pub fn year_value(&self) -> Option<i32> {
        self.year.as_deref().and_then(find_year_in_str)
    }

    fn matches_search(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.title.to_lowercase().contains(needle)
            || self
                .plot
                .as_deref()
                .is_some_and(|p| p.to_lowercase().contains(needle))
    }

    fn matches_genre(&self, genre: &str) -> bool {
        let genre = genre.to_lowercase();
        self.genre
            .as_deref()
            .is_some_and(|g| g.to_lowercase().contains(&genre))
    }
}

pub fn collect_cards(library: &Library) -> Vec<Card> {
    let movies = library.movies.iter().map(|m| {
        (
            ItemKey::Movie(m.id),
            MediaKind::Movie,
            m.title.as_str(),
            m.year,
            &m.metadata,
            m.favorite,
            0usize,
        )
    });
    let series = library.series.values().map(|s| {
        (
            ItemKey::Series(s.name.clone()),
            MediaKind::Series,
            s.name.as_str(),
            None,
            &s.metadata,
            s.favorite,
            s.episodes.len(),
        )
    });
    movies
        .chain(series)
        .enumerate()
        .map(|(order, (key, kind, title, year, md, fav, episodes))| {
            let mut card = Card::new(key, kind, title, year, md, fav, order);
            card.episode_count = episodes;
            card
        })
        .collect()
}

/// Values missing a key sort last in both directions.
fn cmp_present<T: PartialOrd>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn apply_query<'a>(cards: &'a [Card], query: &BrowseQuery) -> Vec<&'a Card> {
    let needle = query.search.trim().to_lowercase();
    let genre = query.genre.as_deref().filter(|g| !g.trim().is_empty());

    let mut out: Vec<&Card> = cards
        .iter()
        .filter(|c| match query.category {
            Category::All => true,
            Category::Movies => c.kind == MediaKind::Movie,
            Category::Series => c.kind == MediaKind::Series,
            Category::Favorites => c.favorite,
        })
        .filter(|c| c.matches_search(&needle))
        .filter(|c| genre.is_none_or(|g| c.matches_genre(g)))
        .collect();

    let by_title = |a: &&Card, b: &&Card| a.title.to_lowercase().cmp(&b.title.to_lowercase());
    match query.sort {
        SortKey::Added => out.sort_by_key(|c| c.order),
        SortKey::Title => out.sort_by(by_title),
        SortKey::Rating => out.sort_by(|a, b| {
            cmp_present(a.rating_value(), b.rating_value(), true).then_with(|| by_title(a, b))
        }),
        SortKey::YearNewest => out.sort_by(|a, b| {
            cmp_present(a.year_value(), b.year_value(), true).then_with(|| by_title(a, b))
        }),
        SortKey::YearOldest => out.sort_by(|a, b| {
            cmp_present(a.year_value(), b.year_value(), false).then_with(|| by_title(a, b))
        }),
    }
    out
}

/// Unique genres across movies and series, sorted.
pub fn collect_genres(library: &Library) -> Vec<String> {
    library
        .movies
        .iter()
        .map(|m| &m.metadata)
        .chain(library.series.values().map(|s| &s.metadata))
        .flat_map(Metadata::genres)
        .map(str::to_string)
        .sorted()
        .dedup()
        .collect()
}

pub fn pick_random<'a, R: Rng + ?Sized>(cards: &[&'a Card], rng: &mut R) -> Option<&'a Card> {
    cards.choose(rng).copied()
}

/// The file to play for a card: the movie itself, or a random episode.
pub fn random_playable<'a, R: Rng + ?Sized>(
    library: &'a Library,
    key: &ItemKey,
    rng: &mut R,
) -> Option<&'a MediaItem> {
    match key {
        ItemKey::Movie(id) => library.movie(*id),
        ItemKey::Series(name) => library.series.get(name)?.episodes.choose(rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{MetadataState, SeriesEntry};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn movie(id: u64, title: &str, rating: Option<&str>, year: &str, genre: &str) -> MediaItem {
        MediaItem {
            id,
            title: title.into(),
            year: None,
            path: format!("/m/{title}.mkv").into(),
            season: None,
            episode: None,
            metadata: Metadata {
                state: MetadataState::Found,
                rating: rating.map(Into::into),
                plot: Some(format!("Plot of {title}")),
                genre: Some(genre.into()),
                year: Some(year.into()),
                ..Default::default()
            },
            favorite: false,
        }
    }

    fn library() -> Library {
        let mut lib = Library::default();
        lib.movies.push(movie(1, "heat", Some("8.3"), "1995", "Action, Crime"));
        lib.movies.push(movie(2, "Alien", Some("8.5"), "1979", "Horror, Sci-Fi"));
        lib.movies.push(movie(3, "Zodiac", None, "2007", "Crime, Drama"));
        let mut dark = SeriesEntry::new("Dark");
        dark.metadata.year = Some("2017–2020".into());
        dark.metadata.genre = Some("Drama, N/A".into());
        let mut ep = movie(4, "Dark", None, "", "");
        ep.season = Some(1);
        ep.episode = Some(1);
        dark.episodes.push(ep);
        lib.series.insert("Dark".into(), dark);
        lib
    }

    fn titles(cards: &[&Card]) -> Vec<String> {
        cards.iter().map(|c| c.title.clone()).collect()
    }

    #[test]
    fn category_and_search_filters() {
        let mut lib = library();
        lib.toggle_favorite(&ItemKey::Movie(2));
        let cards = collect_cards(&lib);
        assert_eq!(cards.len(), 4);

        let q = |category, search: &str| BrowseQuery {
            category,
            search: search.into(),
            ..Default::default()
        };
        assert_eq!(apply_query(&cards, &q(Category::Movies, "")).len(), 3);
        assert_eq!(titles(&apply_query(&cards, &q(Category::Series, ""))), vec!["Dark"]);
        assert_eq!(titles(&apply_query(&cards, &q(Category::Favorites, ""))), vec!["Alien"]);
        assert_eq!(titles(&apply_query(&cards, &q(Category::All, "HEAT"))), vec!["heat"]);
        // plot text is searched too
        assert_eq!(titles(&apply_query(&cards, &q(Category::All, "plot of z"))), vec!["Zodiac"]);
    }

    #[test]
    fn genre_filter_is_contains_match() {
        let cards = collect_cards(&library());
        let query = BrowseQuery {
            genre: Some("crime".into()),
            ..Default::default()
        };
        assert_eq!(titles(&apply_query(&cards, &query)), vec!["heat", "Zodiac"]);
    }

    #[test]
    fn sort_orders() {
        let cards = collect_cards(&library());
        let sorted = |sort| titles(&apply_query(&cards, &BrowseQuery { sort, ..Default::default() }));
        assert_eq!(sorted(SortKey::Added), vec!["heat", "Alien", "Zodiac", "Dark"]);
        assert_eq!(sorted(SortKey::Title), vec!["Alien", "Dark", "heat", "Zodiac"]);
        assert_eq!(sorted(SortKey::Rating), vec!["Alien", "heat", "Dark", "Zodiac"]);
        assert_eq!(sorted(SortKey::YearNewest), vec!["Dark", "Zodiac", "heat", "Alien"]);
        assert_eq!(sorted(SortKey::YearOldest), vec!["Alien", "heat", "Zodiac", "Dark"]);
    }

    #[test]
    fn genres_are_unique_and_sorted() {
        assert_eq!(
            collect_genres(&library()),
            vec!["Action", "Crime", "Drama", "Horror", "Sci-Fi"]
        );
    }

    #[test]
    fn random_pick_stays_inside_filtered_list() {
        let lib = library();
        let cards = collect_cards(&lib);
        let movies_only = apply_query(
            &cards,
            &BrowseQuery {
                category: Category::Movies,
                ..Default::default()
            },
        );
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let pick = pick_random(&movies_only, &mut rng).unwrap();
            assert_eq!(pick.kind, MediaKind::Movie);
        }
        assert!(pick_random(&[], &mut rng).is_none());

        let ep = random_playable(&lib, &ItemKey::Series("Dark".into()), &mut rng).unwrap();
        assert_eq!(ep.id, 4);
        let m = random_playable(&lib, &ItemKey::Movie(3), &mut rng).unwrap();
        assert_eq!(m.title, "Zodiac");
        assert!(random_playable(&lib, &ItemKey::Series("Nope".into()), &mut rng).is_none());
    }

    #[test]
    fn category_and_sort_names_round_trip() {
        for c in Category::ALL {
            assert_eq!(Category::from_str(c.as_str()), Some(c));
        }
        for s in SortKey::ALL {
            assert_eq!(SortKey::from_str(s.as_str()), Some(s));
        }
    }
}
