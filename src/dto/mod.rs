pub mod player_dto;
